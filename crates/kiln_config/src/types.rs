//! Configuration types deserialized from `kiln.toml`.

use kiln_common::{AssetKind, BuildMode, TransformKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata (name, version, entries, mode).
    pub project: ProjectMeta,
    /// Specifier resolution settings.
    #[serde(default)]
    pub resolve: ResolveConfig,
    /// Transform chain per asset kind.
    #[serde(default)]
    pub chains: ChainsConfig,
    /// Option tables keyed by transform name. Keys are checked against
    /// [`TransformKind`] when the file is loaded.
    #[serde(default)]
    pub transforms: BTreeMap<String, toml::Table>,
    /// Output naming, chunking and style delivery.
    #[serde(default)]
    pub output: OutputConfig,
    /// Incremental cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Watch-mode settings.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub build: BuildConfig,
}

impl ProjectConfig {
    /// Options for `kind`, or an empty table when none are configured.
    pub fn transform_options(&self, kind: TransformKind) -> toml::Table {
        self.transforms.get(kind.name()).cloned().unwrap_or_default()
    }
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// Entry modules, relative to the project root, in build order.
    #[serde(default)]
    pub entries: Vec<String>,
    /// Default build mode when none is given on the command line.
    #[serde(default)]
    pub mode: BuildMode,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// How bare and aliased specifiers are resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Extensions tried, in order, when a specifier names no existing file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Alias name to directory, relative to the project root.
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, PathBuf>,
    /// Package roots searched for bare specifiers, relative to the project root.
    #[serde(default = "default_packages")]
    pub packages: Vec<PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            aliases: default_aliases(),
            packages: default_packages(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [
        ".js", ".html", ".css", ".scss", ".json", ".jpg", ".jpeg", ".png", ".svg", ".webp",
        ".gif", ".woff", ".woff2", ".eot", ".ttf", ".otf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_aliases() -> BTreeMap<String, PathBuf> {
    BTreeMap::from([
        ("images".to_string(), PathBuf::from("src/assets/images")),
        ("fonts".to_string(), PathBuf::from("src/assets/fonts")),
    ])
}

fn default_packages() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}

/// The ordered transform steps applied to each asset kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainsConfig {
    /// Steps for scripts.
    #[serde(default = "default_script_chain")]
    pub script: Vec<TransformKind>,
    /// Steps for stylesheets.
    #[serde(default = "default_style_chain")]
    pub style: Vec<TransformKind>,
    /// Steps for markup pages.
    #[serde(default = "default_markup_chain")]
    pub markup: Vec<TransformKind>,
    /// Steps for images.
    #[serde(default = "default_image_chain")]
    pub image: Vec<TransformKind>,
    /// Steps for fonts.
    #[serde(default)]
    pub font: Vec<TransformKind>,
    /// Steps for JSON data files.
    #[serde(default)]
    pub data: Vec<TransformKind>,
}

impl ChainsConfig {
    /// The configured steps for `kind`.
    pub fn for_kind(&self, kind: AssetKind) -> &[TransformKind] {
        match kind {
            AssetKind::Script => &self.script,
            AssetKind::Style => &self.style,
            AssetKind::Markup => &self.markup,
            AssetKind::Image => &self.image,
            AssetKind::Font => &self.font,
            AssetKind::Data => &self.data,
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            script: default_script_chain(),
            style: default_style_chain(),
            markup: default_markup_chain(),
            image: default_image_chain(),
            font: Vec::new(),
            data: Vec::new(),
        }
    }
}

fn default_script_chain() -> Vec<TransformKind> {
    vec![TransformKind::Downlevel, TransformKind::MinifyScript]
}

fn default_style_chain() -> Vec<TransformKind> {
    vec![
        TransformKind::Preprocess,
        TransformKind::VendorPrefix,
        TransformKind::MinifyStyle,
    ]
}

fn default_markup_chain() -> Vec<TransformKind> {
    vec![TransformKind::MinifyMarkup]
}

fn default_image_chain() -> Vec<TransformKind> {
    vec![TransformKind::OptimizeImage]
}

/// How stylesheets reach the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleDelivery {
    /// Emit separate `.css` chunks.
    #[default]
    Extract,
    /// Append an injection snippet to the entry's script chunk.
    Inline,
}

/// How script and style modules are grouped into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkingPolicy {
    /// One chunk per entry plus a `shared` chunk for modules used by several.
    #[default]
    PerEntry,
    /// A single script chunk and a single style chunk for the whole build.
    Single,
}

/// Filename template overrides for one build mode. Unset fields use the
/// mode's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateOverrides {
    /// Script chunk template.
    pub script: Option<String>,
    /// Style chunk template.
    pub style: Option<String>,
    /// Image, font and data template.
    pub asset: Option<String>,
    /// Markup page template.
    pub markup: Option<String>,
}

/// Fully resolved filename templates for one build mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplates {
    /// Script chunk template.
    pub script: String,
    /// Style chunk template.
    pub style: String,
    /// Image, font and data template.
    pub asset: String,
    /// Markup page template.
    pub markup: String,
}

impl FilenameTemplates {
    /// Built-in templates for `mode`.
    pub fn defaults(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Production => Self {
                script: "[name].[hash].js".to_string(),
                style: "[name].[hash].css".to_string(),
                asset: "[dir]/[name].[hash].[ext]".to_string(),
                markup: "[name].html".to_string(),
            },
            BuildMode::Development => Self {
                script: "[name].[token].js".to_string(),
                style: "[name].[token].css".to_string(),
                asset: "[dir]/[path][name].[ext]".to_string(),
                markup: "[name].html".to_string(),
            },
        }
    }

    /// The templates paired with the config key they came from.
    pub fn named(&self) -> [(&'static str, &str); 4] {
        [
            ("script", &self.script),
            ("style", &self.style),
            ("asset", &self.asset),
            ("markup", &self.markup),
        ]
    }
}

/// Output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output root, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Style delivery mode.
    #[serde(default)]
    pub styles: StyleDelivery,
    /// Chunking policy.
    #[serde(default)]
    pub chunking: ChunkingPolicy,
    /// Chunk name used by the `single` policy.
    #[serde(default = "default_bundle_name")]
    pub bundle_name: String,
    /// Chunk name for modules reachable from several entries.
    #[serde(default = "default_shared_name")]
    pub shared_name: String,
    /// Output subdirectory substituted for `[dir]` on images.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// Output subdirectory substituted for `[dir]` on fonts.
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: String,
    /// Output subdirectory substituted for `[dir]` on data files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Manifest file name inside the output root.
    #[serde(default = "default_manifest_name")]
    pub manifest: String,
    /// Template overrides for development builds.
    #[serde(default)]
    pub development: TemplateOverrides,
    /// Template overrides for production builds.
    #[serde(default)]
    pub production: TemplateOverrides,
}

impl OutputConfig {
    /// Resolves the filename templates for `mode`, applying overrides.
    pub fn templates(&self, mode: BuildMode) -> FilenameTemplates {
        let overrides = match mode {
            BuildMode::Development => &self.development,
            BuildMode::Production => &self.production,
        };
        let defaults = FilenameTemplates::defaults(mode);
        FilenameTemplates {
            script: overrides.script.clone().unwrap_or(defaults.script),
            style: overrides.style.clone().unwrap_or(defaults.style),
            asset: overrides.asset.clone().unwrap_or(defaults.asset),
            markup: overrides.markup.clone().unwrap_or(defaults.markup),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            styles: StyleDelivery::default(),
            chunking: ChunkingPolicy::default(),
            bundle_name: default_bundle_name(),
            shared_name: default_shared_name(),
            images_dir: default_images_dir(),
            fonts_dir: default_fonts_dir(),
            data_dir: default_data_dir(),
            manifest: default_manifest_name(),
            development: TemplateOverrides::default(),
            production: TemplateOverrides::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_bundle_name() -> String {
    "bundle".to_string()
}

fn default_shared_name() -> String {
    "shared".to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_fonts_dir() -> String {
    "fonts".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_manifest_name() -> String {
    "manifest.json".to_string()
}

/// Incremental cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache directory, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Whether transform results are cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entries unused for this many builds are collected. `0` disables GC.
    #[serde(default = "default_gc_after_builds")]
    pub gc_after_builds: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            enabled: true,
            gc_after_builds: default_gc_after_builds(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".kiln-cache")
}

fn default_true() -> bool {
    true
}

fn default_gc_after_builds() -> u32 {
    20
}

/// Watch-mode settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period after the last file event before a rebuild starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    150
}

/// Scheduler settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Worker thread count. Defaults to the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_per_mode() {
        let out = OutputConfig::default();
        let prod = out.templates(BuildMode::Production);
        assert_eq!(prod.script, "[name].[hash].js");
        assert_eq!(prod.asset, "[dir]/[name].[hash].[ext]");
        let dev = out.templates(BuildMode::Development);
        assert_eq!(dev.style, "[name].[token].css");
        assert_eq!(dev.asset, "[dir]/[path][name].[ext]");
        assert_eq!(dev.markup, "[name].html");
    }

    #[test]
    fn overrides_replace_single_fields() {
        let out = OutputConfig {
            production: TemplateOverrides {
                script: Some("bundle.js".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let prod = out.templates(BuildMode::Production);
        assert_eq!(prod.script, "bundle.js");
        assert_eq!(prod.style, "[name].[hash].css");
    }

    #[test]
    fn chain_for_kind() {
        let chains = ChainsConfig::default();
        assert_eq!(
            chains.for_kind(AssetKind::Script),
            &[TransformKind::Downlevel, TransformKind::MinifyScript]
        );
        assert!(chains.for_kind(AssetKind::Font).is_empty());
        assert!(chains.for_kind(AssetKind::Data).is_empty());
        assert_eq!(OutputConfig::default().data_dir, "data");
    }

    #[test]
    fn default_resolution_roots() {
        let resolve = ResolveConfig::default();
        assert_eq!(resolve.extensions[0], ".js");
        assert_eq!(
            resolve.aliases.get("images"),
            Some(&PathBuf::from("src/assets/images"))
        );
        assert_eq!(resolve.packages, vec![PathBuf::from("node_modules")]);
    }
}
