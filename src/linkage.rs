//! Link, universal-binary and debug-symbol planning.
//!
//! For every build variant the planner links one binary per architecture.
//! With a single architecture the linker writes the product directly; with
//! several, each architecture is linked into the intermediates directory and
//! a combiner merges the slices into the product. Binaries that carry code
//! can additionally get a detached symbol file.
//!
//! ```text
//! variant "normal", archs [arm64, x86_64]
//!   ld  -arch arm64  ... -o <objdir>-normal/arm64/App
//!   ld  -arch x86_64 ... -o <objdir>-normal/x86_64/App
//!   lipo -create <both> -output <products>/App
//!   dsymutil <products>/App -o <symbols>/App.dSYM
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::invocation::ToolInvocation;
use crate::target::TargetEnvironment;

/// Catalogue identifier of the standard linker.
pub const LD_TOOL: &str = "com.apple.pbx.linkers.ld";
/// Catalogue identifier of the static archive linker.
pub const LIBTOOL_TOOL: &str = "com.apple.pbx.linkers.libtool";
/// Catalogue identifier of the universal-binary combiner.
pub const LIPO_TOOL: &str = "com.apple.xcode.linkers.lipo";
/// Catalogue identifier of the debug-symbol extractor.
pub const DSYMUTIL_TOOL: &str = "com.apple.tools.dsymutil";

/// Name of the variant whose outputs carry no suffix.
pub const NORMAL_VARIANT: &str = "normal";

/// Errors raised while planning link invocations.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum LinkageError {
    /// One or more required tools are absent from the catalogue.
    #[error("couldn't get linker tools: missing {}", .missing.join(", "))]
    #[diagnostic(
        code(ninjaweave::linkage::missing_tools),
        help("add the missing identifiers to the plan's tool catalogue")
    )]
    MissingTools {
        /// Every identifier that could not be resolved.
        missing: Vec<String>,
    },
}

/// A concrete tool: executable plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    /// Reverse-DNS identifier, for example [`LD_TOOL`].
    pub identifier: String,
    /// Executable the tool runs.
    pub executable: String,
    /// Arguments placed before any generated ones.
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Looks up tools by identifier.
#[cfg_attr(test, mockall::automock)]
pub trait ToolCatalog {
    /// Return the tool registered under `identifier`.
    fn tool(&self, identifier: &str) -> Option<ToolSpec>;
}

impl<S: std::hash::BuildHasher> ToolCatalog for IndexMap<String, ToolSpec, S> {
    fn tool(&self, identifier: &str) -> Option<ToolSpec> {
        self.get(identifier).cloned()
    }
}

/// The four tools linkage needs, resolved together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerTools {
    /// Standard linker.
    pub ld: ToolSpec,
    /// Static archive linker.
    pub libtool: ToolSpec,
    /// Universal-binary combiner.
    pub lipo: ToolSpec,
    /// Debug-symbol extractor.
    pub dsymutil: ToolSpec,
}

impl LinkerTools {
    /// Resolve every required tool from `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkageError::MissingTools`] naming every identifier the
    /// catalogue lacks.
    pub fn resolve(catalog: &dyn ToolCatalog) -> Result<Self, LinkageError> {
        match (
            catalog.tool(LD_TOOL),
            catalog.tool(LIBTOOL_TOOL),
            catalog.tool(LIPO_TOOL),
            catalog.tool(DSYMUTIL_TOOL),
        ) {
            (Some(ld), Some(libtool), Some(lipo), Some(dsymutil)) => Ok(Self {
                ld,
                libtool,
                lipo,
                dsymutil,
            }),
            (ld, libtool, lipo, dsymutil) => {
                let missing = [
                    (LD_TOOL, ld.is_none()),
                    (LIBTOOL_TOOL, libtool.is_none()),
                    (LIPO_TOOL, lipo.is_none()),
                    (DSYMUTIL_TOOL, dsymutil.is_none()),
                ]
                .into_iter()
                .filter_map(|(id, absent)| absent.then(|| id.to_owned()))
                .collect();
                Err(LinkageError::MissingTools { missing })
            }
        }
    }
}

/// Kind of binary a target produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryKind {
    /// A runnable program.
    #[default]
    Executable,
    /// A shared library.
    DynamicLibrary,
    /// A loadable bundle.
    Bundle,
    /// A static archive, produced by the archive linker.
    StaticLibrary,
    /// A relocatable object.
    Object,
}

impl BinaryKind {
    /// Whether a detached symbol file can be extracted from this kind.
    #[must_use]
    pub const fn has_detachable_symbols(self) -> bool {
        !matches!(self, Self::StaticLibrary | Self::Object)
    }
}

/// Where debug information ends up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugInformationFormat {
    /// Debug information stays in the object files.
    #[default]
    #[serde(rename = "dwarf")]
    Dwarf,
    /// Debug information is also extracted into a symbol file.
    #[serde(rename = "dwarf-with-dsym")]
    DwarfWithDsym,
}

/// A file handed to the linker from the frameworks phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkFile {
    /// A prebuilt object file.
    Object(Utf8PathBuf),
    /// A static or dynamic library.
    Library(Utf8PathBuf),
    /// A framework bundle such as `/Library/Frameworks/Foo.framework`.
    Framework(Utf8PathBuf),
}

impl LinkFile {
    fn arguments(&self) -> Vec<String> {
        match self {
            Self::Object(path) | Self::Library(path) => vec![path.to_string()],
            Self::Framework(path) => {
                let name = path.file_stem().unwrap_or(path.as_str());
                path.parent()
                    .filter(|dir| !dir.as_str().is_empty())
                    .map(|dir| format!("-F{dir}"))
                    .into_iter()
                    .chain(["-framework".to_owned(), name.to_owned()])
                    .collect()
            }
        }
    }
}

/// Link-related settings resolved for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkageSettings {
    /// Kind of binary produced.
    #[serde(default)]
    pub kind: BinaryKind,
    /// File name of the linked binary.
    pub executable_name: String,
    /// Binary path relative to the products directory.
    pub executable_path: Utf8PathBuf,
    /// Base directory for per-variant intermediates.
    pub object_file_dir: Utf8PathBuf,
    /// Where debug information ends up.
    #[serde(default)]
    pub debug_information_format: DebugInformationFormat,
    /// Directory receiving symbol files; defaults to the products directory.
    #[serde(default)]
    pub symbol_folder: Option<Utf8PathBuf>,
    /// Symbol file name; defaults to `<product file name>.dSYM`.
    #[serde(default)]
    pub symbol_file_name: Option<String>,
    /// Files from the frameworks phase.
    #[serde(default)]
    pub files: Vec<LinkFile>,
}

/// Compiled invocations for one variant and architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantArchitectureInvocations {
    /// Build variant.
    pub variant: String,
    /// Architecture.
    pub architecture: String,
    /// Compile invocations for this slice.
    pub invocations: Vec<ToolInvocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompilationSummaryDef {
    #[serde(default)]
    linker_driver: Option<String>,
    #[serde(default)]
    linker_arguments: Vec<String>,
    #[serde(default)]
    invocations: Vec<VariantArchitectureInvocations>,
}

/// What the compilation phase tells the linker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "CompilationSummaryDef")]
pub struct CompilationSummary {
    /// Compiler driver used in place of the standard linker's executable.
    pub linker_driver: Option<String>,
    /// Arguments placed before generated link arguments.
    pub linker_arguments: Vec<String>,
    invocations: IndexMap<(String, String), Vec<ToolInvocation>>,
}

impl From<CompilationSummaryDef> for CompilationSummary {
    fn from(def: CompilationSummaryDef) -> Self {
        let mut summary = Self {
            linker_driver: def.linker_driver,
            linker_arguments: def.linker_arguments,
            invocations: IndexMap::new(),
        };
        for slice in def.invocations {
            summary.insert(slice.variant, slice.architecture, slice.invocations);
        }
        summary
    }
}

impl CompilationSummary {
    /// Append `invocations` to the (`variant`, `architecture`) slice.
    pub fn insert(
        &mut self,
        variant: impl Into<String>,
        architecture: impl Into<String>,
        invocations: Vec<ToolInvocation>,
    ) {
        self.invocations
            .entry((variant.into(), architecture.into()))
            .or_default()
            .extend(invocations);
    }

    /// Compile invocations for one slice.
    #[must_use]
    pub fn invocations(&self, variant: &str, architecture: &str) -> &[ToolInvocation] {
        self.invocations
            .get(&(variant.to_owned(), architecture.to_owned()))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Every invocation across all slices, in insertion order.
    pub fn all_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.invocations.values().flatten()
    }

    /// The `.o` outputs of one slice, in invocation order.
    #[must_use]
    pub fn object_files(&self, variant: &str, architecture: &str) -> Vec<Utf8PathBuf> {
        self.invocations(variant, architecture)
            .iter()
            .flat_map(|inv| &inv.outputs)
            .filter(|output| output.extension() == Some("o"))
            .cloned()
            .collect()
    }
}

/// Which argument shape a link uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerKind {
    /// `ld`-style: `-arch <arch> ... -o <out>`.
    Standard,
    /// `libtool`-style: `-static -arch_only <arch> -o <out> ...`.
    Archive,
}

/// One link step for a single variant and architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlanEntry {
    /// Argument shape.
    pub linker: LinkerKind,
    /// Executable to run.
    pub executable: String,
    /// Arguments placed before the generated ones.
    pub leading_arguments: Vec<String>,
    /// Build variant.
    pub variant: String,
    /// Target architecture.
    pub architecture: String,
    /// Object files from compilation.
    pub objects: Vec<Utf8PathBuf>,
    /// Files from the frameworks phase.
    pub files: Vec<LinkFile>,
    /// Linked binary.
    pub output: Utf8PathBuf,
}

impl LinkPlanEntry {
    /// Build the invocation running this link in `working_directory`.
    #[must_use]
    pub fn into_invocation(self, working_directory: &Utf8Path) -> ToolInvocation {
        let objects = self.objects.iter().map(ToString::to_string);
        let files = self.files.iter().flat_map(LinkFile::arguments);
        let mut arguments = self.leading_arguments;
        let description = match self.linker {
            LinkerKind::Standard => {
                arguments.extend(["-arch".to_owned(), self.architecture.clone()]);
                arguments.extend(objects.chain(files));
                arguments.extend(["-o".to_owned(), self.output.to_string()]);
                format!("Ld {} {} {}", self.output, self.variant, self.architecture)
            }
            LinkerKind::Archive => {
                arguments.extend([
                    "-static".to_owned(),
                    "-arch_only".to_owned(),
                    self.architecture.clone(),
                    "-o".to_owned(),
                    self.output.to_string(),
                ]);
                arguments.extend(objects.chain(files));
                format!("Libtool {} {} {}", self.output, self.variant, self.architecture)
            }
        };

        let (frameworks, linked): (Vec<_>, Vec<_>) = self
            .files
            .iter()
            .partition(|file| matches!(file, LinkFile::Framework(_)));
        let inputs = self
            .objects
            .iter()
            .cloned()
            .chain(linked.into_iter().filter_map(|file| match file {
                LinkFile::Object(path) | LinkFile::Library(path) => Some(path.clone()),
                LinkFile::Framework(_) => None,
            }))
            .collect();
        let input_dependencies = frameworks
            .into_iter()
            .filter_map(|file| match file {
                LinkFile::Framework(path) => Some(path.clone()),
                LinkFile::Object(_) | LinkFile::Library(_) => None,
            })
            .collect();

        ToolInvocation {
            executable: self.executable,
            arguments,
            working_directory: working_directory.to_owned(),
            outputs: vec![self.output],
            inputs,
            input_dependencies,
            description,
            ..ToolInvocation::default()
        }
    }
}

/// Suffix appended to binaries of `variant`: empty for `normal`.
#[must_use]
pub fn variant_suffix(variant: &str) -> String {
    if variant == NORMAL_VARIANT {
        String::new()
    } else {
        format!("_{variant}")
    }
}

/// Plans every link-related invocation of one target.
pub struct LinkagePlanner<'a> {
    tools: LinkerTools,
    environment: &'a TargetEnvironment,
    settings: &'a LinkageSettings,
    compilation: &'a CompilationSummary,
}

impl<'a> LinkagePlanner<'a> {
    /// Prepare a planner, resolving the required tools up front.
    ///
    /// # Errors
    ///
    /// Returns [`LinkageError::MissingTools`] if any required tool is absent.
    pub fn new(
        catalog: &dyn ToolCatalog,
        environment: &'a TargetEnvironment,
        settings: &'a LinkageSettings,
        compilation: &'a CompilationSummary,
    ) -> Result<Self, LinkageError> {
        Ok(Self {
            tools: LinkerTools::resolve(catalog)?,
            environment,
            settings,
            compilation,
        })
    }

    /// Produce link, combine and symbol invocations for every variant.
    #[must_use]
    pub fn plan(&self) -> Vec<ToolInvocation> {
        let env = self.environment;
        if env.architectures.is_empty() {
            warn!("no architectures configured; nothing to link");
        }
        let (linker, tool, executable, leading) = self.linker();
        let mut invocations = Vec::new();

        for variant in &env.variants {
            let suffix = variant_suffix(variant);
            let intermediate_name = format!("{}{suffix}", self.settings.executable_name);
            let intermediate_dir =
                Utf8PathBuf::from(format!("{}-{variant}", self.settings.object_file_dir));
            let product = env
                .products_dir
                .join(format!("{}{suffix}", self.settings.executable_path));
            let universal = env.architectures.len() > 1;
            let mut slices = Vec::new();

            for arch in &env.architectures {
                let output = if universal {
                    intermediate_dir.join(arch).join(&intermediate_name)
                } else {
                    product.clone()
                };
                let entry = LinkPlanEntry {
                    linker,
                    executable: executable.clone(),
                    leading_arguments: leading.clone(),
                    variant: variant.clone(),
                    architecture: arch.clone(),
                    objects: self.compilation.object_files(variant, arch),
                    files: self.settings.files.clone(),
                    output: output.clone(),
                };
                debug!(tool = %tool.identifier, %variant, %arch, %output, "planned link");
                invocations.push(entry.into_invocation(&env.working_directory));
                slices.push(output);
            }

            if universal {
                invocations.push(self.combine(variant, slices, &product));
            }
            if self.settings.debug_information_format == DebugInformationFormat::DwarfWithDsym
                && self.settings.kind.has_detachable_symbols()
            {
                invocations.push(self.extract_symbols(&product));
            }
        }
        invocations
    }

    fn linker(&self) -> (LinkerKind, &ToolSpec, String, Vec<String>) {
        if self.settings.kind == BinaryKind::StaticLibrary {
            let tool = &self.tools.libtool;
            return (
                LinkerKind::Archive,
                tool,
                tool.executable.clone(),
                tool.arguments.clone(),
            );
        }
        let tool = &self.tools.ld;
        let executable = self
            .compilation
            .linker_driver
            .clone()
            .unwrap_or_else(|| tool.executable.clone());
        let leading = tool
            .arguments
            .iter()
            .chain(&self.compilation.linker_arguments)
            .cloned()
            .collect();
        (LinkerKind::Standard, tool, executable, leading)
    }

    fn combine(&self, variant: &str, slices: Vec<Utf8PathBuf>, product: &Utf8Path) -> ToolInvocation {
        let tool = &self.tools.lipo;
        let mut arguments = tool.arguments.clone();
        arguments.push("-create".to_owned());
        arguments.extend(slices.iter().map(ToString::to_string));
        arguments.extend(["-output".to_owned(), product.to_string()]);
        ToolInvocation {
            executable: tool.executable.clone(),
            arguments,
            working_directory: self.environment.working_directory.clone(),
            outputs: vec![product.to_owned()],
            inputs: slices,
            description: format!(
                "CreateUniversalBinary {product} {variant} {}",
                self.environment.architectures.iter().join(" ")
            ),
            ..ToolInvocation::default()
        }
    }

    fn extract_symbols(&self, product: &Utf8Path) -> ToolInvocation {
        let tool = &self.tools.dsymutil;
        let folder = self
            .settings
            .symbol_folder
            .as_deref()
            .unwrap_or(&self.environment.products_dir);
        let file_name = self.settings.symbol_file_name.clone().unwrap_or_else(|| {
            format!("{}.dSYM", product.file_name().unwrap_or(product.as_str()))
        });
        let symbols = folder.join(file_name);
        let mut arguments = tool.arguments.clone();
        arguments.extend([product.to_string(), "-o".to_owned(), symbols.to_string()]);
        ToolInvocation {
            executable: tool.executable.clone(),
            arguments,
            working_directory: self.environment.working_directory.clone(),
            description: format!("GenerateDSYMFile {symbols} {product}"),
            outputs: vec![symbols],
            inputs: vec![product.to_owned()],
            ..ToolInvocation::default()
        }
    }
}
