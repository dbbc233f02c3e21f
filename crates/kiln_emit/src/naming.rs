//! Output file naming from filename templates.

use std::path::{Path, PathBuf};

use kiln_cache::CacheEntry;
use kiln_common::{AssetKind, BuildMode, ContentHash};
use kiln_config::{Placeholder, ProjectConfig, Template};
use kiln_graph::Module;
use kiln_scheduler::IdentityAssigner;

use crate::chunk::ChunkKind;
use crate::error::EmitError;

/// Length of the `[hash]` substitution.
const HASH_LEN: usize = 8;

/// Expands the configured templates for one build.
///
/// In production `[hash]` is the first eight hex digits of the output
/// fingerprint; in development `[token]` is `dev<N>` for the N-th build of
/// the session.
#[derive(Debug, Clone)]
pub struct Namer {
    mode: BuildMode,
    script: Template,
    style: Template,
    asset: Template,
    markup: Template,
    images_dir: String,
    fonts_dir: String,
    data_dir: String,
    root: PathBuf,
    contexts: Vec<PathBuf>,
    token: String,
}

impl Namer {
    /// Prepares the templates of `config` for a `mode` build of the project
    /// at `root`. `build_number` feeds `[token]`.
    pub fn new(
        config: &ProjectConfig,
        root: &Path,
        mode: BuildMode,
        build_number: u64,
    ) -> Result<Self, EmitError> {
        let templates = config.output.templates(mode);
        let parse = |source: &str| {
            Template::parse(source).map_err(|e| EmitError::Template {
                template: source.to_string(),
                reason: e.to_string(),
            })
        };

        let mut contexts: Vec<PathBuf> = config
            .resolve
            .aliases
            .values()
            .map(|dir| {
                let dir = root.join(dir);
                std::fs::canonicalize(&dir).unwrap_or(dir)
            })
            .collect();
        contexts.sort_by_key(|c| std::cmp::Reverse(c.components().count()));

        Ok(Self {
            mode,
            script: parse(&templates.script)?,
            style: parse(&templates.style)?,
            asset: parse(&templates.asset)?,
            markup: parse(&templates.markup)?,
            images_dir: config.output.images_dir.clone(),
            fonts_dir: config.output.fonts_dir.clone(),
            data_dir: config.output.data_dir.clone(),
            root: root.to_path_buf(),
            contexts,
            token: format!("dev{build_number}"),
        })
    }

    /// The mode this namer was prepared for.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Emitted path of a standalone module.
    pub fn module_path(&self, module: &Module, output: &CacheEntry) -> String {
        let (template, dir) = match output.kind {
            AssetKind::Image => (&self.asset, self.images_dir.as_str()),
            AssetKind::Font => (&self.asset, self.fonts_dir.as_str()),
            AssetKind::Data => (&self.asset, self.data_dir.as_str()),
            _ => (&self.markup, ""),
        };
        let context_path = self.context_path(module.path());
        let name = template.render(|p| match p {
            Placeholder::Name => module.stem().to_string(),
            Placeholder::Ext => output.extension.clone(),
            Placeholder::Dir => dir.to_string(),
            Placeholder::Path => context_path.clone(),
            Placeholder::Hash => output.fingerprint.short(HASH_LEN),
            Placeholder::Token => self.token.clone(),
        });
        normalize(&name)
    }

    /// Emitted path of a chunk whose contents fingerprint to `fingerprint`.
    pub fn chunk_path(&self, kind: ChunkKind, name: &str, fingerprint: &ContentHash) -> String {
        let template = match kind {
            ChunkKind::Script => &self.script,
            ChunkKind::Style => &self.style,
        };
        let rendered = template.render(|p| match p {
            Placeholder::Name => name.to_string(),
            Placeholder::Ext => kind.extension().to_string(),
            Placeholder::Dir | Placeholder::Path => String::new(),
            Placeholder::Hash => fingerprint.short(HASH_LEN),
            Placeholder::Token => self.token.clone(),
        });
        normalize(&rendered)
    }

    /// Directory of `path` relative to the deepest alias root containing
    /// it (or the project root), with a trailing `/` when non-empty.
    fn context_path(&self, path: &Path) -> String {
        let Some(parent) = path.parent() else {
            return String::new();
        };
        let base = self
            .contexts
            .iter()
            .find(|c| parent.starts_with(c))
            .unwrap_or(&self.root);
        let rel: Vec<String> = parent
            .strip_prefix(base)
            .map(|r| {
                r.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        if rel.is_empty() {
            String::new()
        } else {
            format!("{}/", rel.join("/"))
        }
    }
}

impl IdentityAssigner for Namer {
    fn assign(&self, module: &Module, output: &CacheEntry) -> String {
        self.module_path(module, output)
    }
}

/// Drops empty path segments so `[dir]/x` with an empty dir becomes `x`.
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_graph::ModuleId;

    fn config(extra: &str) -> ProjectConfig {
        kiln_config::load_config_from_str(&format!(
            "[project]\nname = \"site\"\nentries = [\"src/js/index.js\"]\n{extra}"
        ))
        .unwrap()
    }

    fn module(path: &str, kind: AssetKind) -> Module {
        Module {
            id: ModuleId::from_raw(0),
            path: PathBuf::from(path),
            rel_path: path.trim_start_matches("/p/").to_string(),
            kind: Some(kind),
            fingerprint: ContentHash::from_bytes(b"src"),
            bytes: Vec::new(),
            source: None,
            references: Vec::new(),
        }
    }

    fn output(bytes: &[u8], kind: AssetKind, ext: &str) -> CacheEntry {
        CacheEntry::new(bytes.to_vec(), kind, ext)
    }

    #[test]
    fn production_assets_are_hashed() {
        let namer = Namer::new(&config(""), Path::new("/p"), BuildMode::Production, 1).unwrap();
        let logo = module("/p/src/assets/images/icons/logo.png", AssetKind::Image);
        let out = output(b"png bytes", AssetKind::Image, "png");
        let hash = out.fingerprint.short(8);
        assert_eq!(namer.module_path(&logo, &out), format!("images/logo.{hash}.png"));
    }

    #[test]
    fn development_assets_keep_path_below_alias_root() {
        let namer = Namer::new(&config(""), Path::new("/p"), BuildMode::Development, 3).unwrap();
        let logo = module("/p/src/assets/images/icons/logo.png", AssetKind::Image);
        let out = output(b"png bytes", AssetKind::Image, "png");
        assert_eq!(namer.module_path(&logo, &out), "images/icons/logo.png");

        let font = module("/p/src/assets/fonts/inter.woff2", AssetKind::Font);
        let out = output(b"wOF2", AssetKind::Font, "woff2");
        assert_eq!(namer.module_path(&font, &out), "fonts/inter.woff2");

        let strings = module("/p/src/data/en.json", AssetKind::Data);
        let out = output(b"{}", AssetKind::Data, "json");
        assert_eq!(namer.module_path(&strings, &out), "data/src/data/en.json");
    }

    #[test]
    fn assets_outside_aliases_use_project_relative_path() {
        let namer = Namer::new(&config(""), Path::new("/p"), BuildMode::Development, 1).unwrap();
        let img = module("/p/src/img/a.gif", AssetKind::Image);
        let out = output(b"GIF89a", AssetKind::Image, "gif");
        assert_eq!(namer.module_path(&img, &out), "images/src/img/a.gif");
    }

    #[test]
    fn markup_pages_use_markup_template() {
        let namer = Namer::new(&config(""), Path::new("/p"), BuildMode::Production, 1).unwrap();
        let page = module("/p/src/index.html", AssetKind::Markup);
        let out = output(b"<html>", AssetKind::Markup, "html");
        assert_eq!(namer.assign(&page, &out), "index.html");
    }

    #[test]
    fn chunk_names_per_mode() {
        let fp = ContentHash::from_bytes(b"bundle contents");
        let prod = Namer::new(&config(""), Path::new("/p"), BuildMode::Production, 1).unwrap();
        assert_eq!(
            prod.chunk_path(ChunkKind::Script, "index", &fp),
            format!("index.{}.js", fp.short(8))
        );
        let dev = Namer::new(&config(""), Path::new("/p"), BuildMode::Development, 7).unwrap();
        assert_eq!(dev.chunk_path(ChunkKind::Style, "index", &fp), "index.dev7.css");
    }

    #[test]
    fn overrides_apply() {
        let cfg = config("[output.production]\nscript = \"js/[name].js\"\n");
        let namer = Namer::new(&cfg, Path::new("/p"), BuildMode::Production, 1).unwrap();
        let fp = ContentHash::from_bytes(b"x");
        assert_eq!(namer.chunk_path(ChunkKind::Script, "bundle", &fp), "js/bundle.js");
    }
}
