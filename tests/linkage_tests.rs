//! Link planning scenarios: universal binaries, static archives, detached
//! symbols and linker selection.

use indexmap::IndexMap;
use ninjaweave::invocation::ToolInvocation;
use ninjaweave::linkage::{
    BinaryKind, CompilationSummary, DSYMUTIL_TOOL, DebugInformationFormat, LD_TOOL, LIBTOOL_TOOL,
    LIPO_TOOL, LinkFile, LinkageError, LinkagePlanner, LinkageSettings, ToolSpec,
};
use ninjaweave::target::TargetEnvironment;
use rstest::{fixture, rstest};
use test_support::InvocationBuilder;

#[fixture]
fn catalog() -> IndexMap<String, ToolSpec> {
    [
        (LD_TOOL, "/usr/bin/ld"),
        (LIBTOOL_TOOL, "/usr/bin/libtool"),
        (LIPO_TOOL, "/usr/bin/lipo"),
        (DSYMUTIL_TOOL, "/usr/bin/dsymutil"),
    ]
    .into_iter()
    .map(|(id, exe)| {
        (
            id.to_owned(),
            ToolSpec {
                identifier: id.to_owned(),
                executable: exe.to_owned(),
                arguments: Vec::new(),
            },
        )
    })
    .collect()
}

fn environment(variants: &[&str], architectures: &[&str]) -> TargetEnvironment {
    TargetEnvironment {
        search_paths: Vec::new(),
        variants: variants.iter().map(ToString::to_string).collect(),
        architectures: architectures.iter().map(ToString::to_string).collect(),
        working_directory: "/src".into(),
        temp_dir: "/obj/App.build".into(),
        products_dir: "/products".into(),
    }
}

fn settings(kind: BinaryKind, name: &str) -> LinkageSettings {
    LinkageSettings {
        kind,
        executable_name: name.to_owned(),
        executable_path: name.into(),
        object_file_dir: "/obj/App.build/Objects".into(),
        debug_information_format: DebugInformationFormat::Dwarf,
        symbol_folder: None,
        symbol_file_name: None,
        files: Vec::new(),
    }
}

fn compiled(pairs: &[(&str, &str, &str)]) -> CompilationSummary {
    let mut summary = CompilationSummary::default();
    for (variant, arch, object) in pairs {
        let dependency_file = object.replace(".o", ".d");
        summary.insert(
            *variant,
            *arch,
            vec![
                InvocationBuilder::new("/usr/bin/clang")
                    .output(object)
                    .output(&dependency_file)
                    .build(),
            ],
        );
    }
    summary
}

fn args(invocation: &ToolInvocation) -> Vec<&str> {
    invocation.arguments.iter().map(String::as_str).collect()
}

#[rstest]
fn two_architectures_produce_a_universal_binary(catalog: IndexMap<String, ToolSpec>) {
    let env = environment(&["normal"], &["arm64", "x86_64"]);
    let settings = settings(BinaryKind::Executable, "App");
    let summary = compiled(&[
        ("normal", "arm64", "/obj/arm64/main.o"),
        ("normal", "x86_64", "/obj/x86_64/main.o"),
    ]);
    let planned = LinkagePlanner::new(&catalog, &env, &settings, &summary)
        .expect("tools resolve")
        .plan();

    assert_eq!(planned.len(), 3);
    let [arm, intel, lipo] = planned.as_slice() else {
        panic!("expected three invocations, got {planned:?}");
    };
    assert_eq!(arm.executable, "/usr/bin/ld");
    assert_eq!(
        args(arm),
        ["-arch", "arm64", "/obj/arm64/main.o", "-o", "/obj/App.build/Objects-normal/arm64/App"]
    );
    assert_eq!(arm.inputs, ["/obj/arm64/main.o"]);
    assert_eq!(arm.working_directory, "/src");
    assert_eq!(arm.description, "Ld /obj/App.build/Objects-normal/arm64/App normal arm64");
    assert_eq!(intel.outputs, ["/obj/App.build/Objects-normal/x86_64/App"]);

    assert_eq!(lipo.executable, "/usr/bin/lipo");
    assert_eq!(
        args(lipo),
        [
            "-create",
            "/obj/App.build/Objects-normal/arm64/App",
            "/obj/App.build/Objects-normal/x86_64/App",
            "-output",
            "/products/App",
        ]
    );
    assert_eq!(lipo.outputs, ["/products/App"]);
    assert_eq!(lipo.description, "CreateUniversalBinary /products/App normal arm64 x86_64");
}

#[rstest]
fn static_libraries_use_the_archive_linker(catalog: IndexMap<String, ToolSpec>) {
    let env = environment(&["normal"], &["x86_64"]);
    let mut settings = settings(BinaryKind::StaticLibrary, "libCore.a");
    settings.debug_information_format = DebugInformationFormat::DwarfWithDsym;
    let mut summary = compiled(&[("normal", "x86_64", "/obj/core.o")]);
    summary.linker_driver = Some("/usr/bin/clang".to_owned());
    summary.linker_arguments = vec!["-ObjC".to_owned()];

    let planned = LinkagePlanner::new(&catalog, &env, &settings, &summary)
        .expect("tools resolve")
        .plan();

    assert_eq!(planned.len(), 1, "archives get no symbol extraction");
    let archive = planned.first().expect("archive invocation");
    assert_eq!(archive.executable, "/usr/bin/libtool");
    assert_eq!(
        args(archive),
        ["-static", "-arch_only", "x86_64", "-o", "/products/libCore.a", "/obj/core.o"]
    );
    assert_eq!(archive.description, "Libtool /products/libCore.a normal x86_64");
}

#[rstest]
fn detached_symbols_are_extracted_per_variant(catalog: IndexMap<String, ToolSpec>) {
    let env = environment(&["normal", "debug"], &["x86_64"]);
    let mut settings = settings(BinaryKind::Executable, "App");
    settings.debug_information_format = DebugInformationFormat::DwarfWithDsym;
    let summary = compiled(&[
        ("normal", "x86_64", "/obj/normal/main.o"),
        ("debug", "x86_64", "/obj/debug/main.o"),
    ]);

    let planned = LinkagePlanner::new(&catalog, &env, &settings, &summary)
        .expect("tools resolve")
        .plan();

    let outputs: Vec<_> = planned
        .iter()
        .flat_map(|inv| inv.outputs.iter().map(|o| o.as_str()))
        .collect();
    assert_eq!(
        outputs,
        [
            "/products/App",
            "/products/App.dSYM",
            "/products/App_debug",
            "/products/App_debug.dSYM",
        ]
    );
    let dsym = planned.get(1).expect("symbol invocation");
    assert_eq!(dsym.executable, "/usr/bin/dsymutil");
    assert_eq!(args(dsym), ["/products/App", "-o", "/products/App.dSYM"]);
    assert_eq!(dsym.inputs, ["/products/App"]);
    assert_eq!(dsym.description, "GenerateDSYMFile /products/App.dSYM /products/App");
    let debug_link = planned.get(2).expect("debug link");
    assert_eq!(debug_link.inputs, ["/obj/debug/main.o"]);
}

#[rstest]
fn symbol_location_can_be_overridden(catalog: IndexMap<String, ToolSpec>) {
    let env = environment(&["normal"], &["arm64"]);
    let mut settings = settings(BinaryKind::Bundle, "Plugin");
    settings.debug_information_format = DebugInformationFormat::DwarfWithDsym;
    settings.symbol_folder = Some("/symbols".into());
    settings.symbol_file_name = Some("Plugin.bundle.dSYM".to_owned());

    let planned = LinkagePlanner::new(&catalog, &env, &settings, &CompilationSummary::default())
        .expect("tools resolve")
        .plan();
    let dsym = planned.last().expect("symbol invocation");
    assert_eq!(dsym.outputs, ["/symbols/Plugin.bundle.dSYM"]);
}

#[rstest]
#[case(BinaryKind::Object)]
#[case(BinaryKind::StaticLibrary)]
fn kinds_without_symbols_skip_extraction(
    catalog: IndexMap<String, ToolSpec>,
    #[case] kind: BinaryKind,
) {
    let env = environment(&["normal"], &["arm64"]);
    let mut settings = settings(kind, "thing");
    settings.debug_information_format = DebugInformationFormat::DwarfWithDsym;
    let planned = LinkagePlanner::new(&catalog, &env, &settings, &CompilationSummary::default())
        .expect("tools resolve")
        .plan();
    assert!(planned.iter().all(|inv| inv.executable != "/usr/bin/dsymutil"));
}

#[rstest]
fn compiler_driver_replaces_the_linker(catalog: IndexMap<String, ToolSpec>) {
    let env = environment(&["normal"], &["arm64"]);
    let mut settings = settings(BinaryKind::DynamicLibrary, "libUI.dylib");
    settings.files = vec![
        LinkFile::Library("/usr/lib/libz.dylib".into()),
        LinkFile::Framework("/System/Library/Frameworks/Cocoa.framework".into()),
    ];
    let mut summary = compiled(&[("normal", "arm64", "/obj/ui.o")]);
    summary.linker_driver = Some("/usr/bin/clang++".to_owned());
    summary.linker_arguments = vec!["-dynamiclib".to_owned()];

    let planned = LinkagePlanner::new(&catalog, &env, &settings, &summary)
        .expect("tools resolve")
        .plan();
    let link = planned.first().expect("link invocation");
    assert_eq!(link.executable, "/usr/bin/clang++");
    assert_eq!(
        args(link),
        [
            "-dynamiclib",
            "-arch",
            "arm64",
            "/obj/ui.o",
            "/usr/lib/libz.dylib",
            "-F/System/Library/Frameworks",
            "-framework",
            "Cocoa",
            "-o",
            "/products/libUI.dylib",
        ]
    );
    assert_eq!(link.inputs, ["/obj/ui.o", "/usr/lib/libz.dylib"]);
    assert_eq!(
        link.input_dependencies,
        ["/System/Library/Frameworks/Cocoa.framework"]
    );
}

#[rstest]
fn missing_tools_fail_before_planning(mut catalog: IndexMap<String, ToolSpec>) {
    catalog.shift_remove(LIPO_TOOL);
    catalog.shift_remove(DSYMUTIL_TOOL);
    let env = environment(&["normal"], &["arm64"]);
    let settings = settings(BinaryKind::Executable, "App");
    let summary = CompilationSummary::default();
    let err = LinkagePlanner::new(&catalog, &env, &settings, &summary)
        .err()
        .expect("missing tools");
    assert_eq!(
        err,
        LinkageError::MissingTools {
            missing: vec![LIPO_TOOL.to_owned(), DSYMUTIL_TOOL.to_owned()],
        }
    );
    assert!(err.to_string().contains(LIPO_TOOL));
}
