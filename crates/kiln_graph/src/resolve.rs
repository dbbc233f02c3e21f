//! Specifier resolution.

use kiln_config::ResolveConfig;
use std::path::{Component, Path, PathBuf};

/// Returns `true` for specifiers that point outside the project: URLs,
/// protocol-relative and data URIs, and in-page fragments.
pub fn is_external(specifier: &str) -> bool {
    const SCHEMES: [&str; 6] = ["http:", "https:", "//", "data:", "mailto:", "#"];
    let s = specifier.trim();
    s.is_empty() || SCHEMES.iter().any(|p| s.starts_with(p))
}

/// Maps specifiers to canonical file paths.
///
/// Resolution order is fixed: relative specifiers (`./`, `../`) against the
/// referrer's directory, then alias roots (a leading `~` is stripped), then
/// package roots. Each candidate is tried as an exact file, then with each
/// configured extension appended, then as a directory holding `index.<ext>`.
pub struct Resolver {
    root: PathBuf,
    aliases: Vec<(String, PathBuf)>,
    packages: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl Resolver {
    /// Creates a resolver for the project at `root`.
    pub fn new(root: &Path, config: &ResolveConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            aliases: config
                .aliases
                .iter()
                .map(|(k, v)| (k.clone(), root.join(v)))
                .collect(),
            packages: config.packages.iter().map(|p| root.join(p)).collect(),
            extensions: config.extensions.clone(),
        }
    }

    /// Resolves an entry path given relative to the project root.
    pub fn resolve_entry(&self, entry: &str) -> Option<PathBuf> {
        self.try_candidate(&self.root.join(entry))
    }

    /// Resolves `specifier` as written in the module at `from`.
    ///
    /// With `bare_is_relative`, a bare specifier that matches no alias or
    /// package is finally tried against the referrer's directory, which is
    /// how `url(img.png)` and `src="js/app.js"` are meant.
    pub fn resolve(&self, specifier: &str, from: &Path, bare_is_relative: bool) -> Option<PathBuf> {
        let spec = strip_query(specifier.trim());
        let base = from.parent().unwrap_or(&self.root);

        if spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".." {
            return self.try_candidate(&base.join(spec));
        }
        if let Some(abs) = spec.strip_prefix('/') {
            return self.try_candidate(&self.root.join(abs));
        }

        let bare = spec.strip_prefix('~').unwrap_or(spec);
        let (first, rest) = bare.split_once('/').unwrap_or((bare, ""));
        for (alias, dir) in &self.aliases {
            if alias == first {
                let candidate = if rest.is_empty() { dir.clone() } else { dir.join(rest) };
                if let Some(found) = self.try_candidate(&candidate) {
                    return Some(found);
                }
            }
        }
        for package_root in &self.packages {
            if let Some(found) = self.try_candidate(&package_root.join(bare)) {
                return Some(found);
            }
        }
        if bare_is_relative {
            return self.try_candidate(&base.join(bare));
        }
        None
    }

    fn try_candidate(&self, candidate: &Path) -> Option<PathBuf> {
        let candidate = normalize(candidate);
        if candidate.is_file() {
            return canonical(&candidate);
        }
        let name = candidate.file_name()?.to_string_lossy().into_owned();
        for ext in &self.extensions {
            let with_ext = candidate.with_file_name(format!("{name}{ext}"));
            if with_ext.is_file() {
                return canonical(&with_ext);
            }
        }
        if candidate.is_dir() {
            for ext in &self.extensions {
                let index = candidate.join(format!("index{ext}"));
                if index.is_file() {
                    return canonical(&index);
                }
            }
        }
        None
    }
}

fn canonical(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok()
}

/// Drops `?query` and `#fragment` suffixes, as in `font.woff2?v=3#iefix`.
fn strip_query(specifier: &str) -> &str {
    let end = specifier.find(['?', '#']).unwrap_or(specifier.len());
    &specifier[..end]
}

/// Removes `.` components and folds `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for file in [
            "src/js/index.js",
            "src/js/util.js",
            "src/js/lib/index.js",
            "src/css/main.scss",
            "src/assets/images/logo.png",
            "node_modules/reset/reset.css",
            "node_modules/widget/index.js",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "x").unwrap();
        }
        let resolver = Resolver::new(root, &ResolveConfig::default());
        (dir, resolver)
    }

    fn canon(dir: &tempfile::TempDir, rel: &str) -> PathBuf {
        fs::canonicalize(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn relative_with_extension_and_index() {
        let (dir, r) = project();
        let from = dir.path().join("src/js/index.js");
        assert_eq!(r.resolve("./util", &from, false), Some(canon(&dir, "src/js/util.js")));
        assert_eq!(r.resolve("./util.js", &from, false), Some(canon(&dir, "src/js/util.js")));
        assert_eq!(r.resolve("./lib", &from, false), Some(canon(&dir, "src/js/lib/index.js")));
        assert_eq!(
            r.resolve("../css/main", &from, false),
            Some(canon(&dir, "src/css/main.scss"))
        );
        assert_eq!(r.resolve("./missing", &from, false), None);
    }

    #[test]
    fn aliases_and_tilde() {
        let (dir, r) = project();
        let from = dir.path().join("src/css/main.scss");
        let logo = Some(canon(&dir, "src/assets/images/logo.png"));
        assert_eq!(r.resolve("images/logo.png", &from, false), logo);
        assert_eq!(r.resolve("~images/logo", &from, false), logo);
    }

    #[test]
    fn package_roots() {
        let (dir, r) = project();
        let from = dir.path().join("src/js/index.js");
        assert_eq!(r.resolve("widget", &from, false), Some(canon(&dir, "node_modules/widget/index.js")));
        assert_eq!(
            r.resolve("~reset/reset.css", &from, false),
            Some(canon(&dir, "node_modules/reset/reset.css"))
        );
    }

    #[test]
    fn bare_relative_fallback() {
        let (dir, r) = project();
        let from = dir.path().join("src/js/index.js");
        assert_eq!(r.resolve("util.js", &from, false), None);
        assert_eq!(r.resolve("util.js", &from, true), Some(canon(&dir, "src/js/util.js")));
    }

    #[test]
    fn query_and_fragment_ignored() {
        let (dir, r) = project();
        let from = dir.path().join("src/css/main.scss");
        assert_eq!(
            r.resolve("../assets/images/logo.png?v=2#x", &from, false),
            Some(canon(&dir, "src/assets/images/logo.png"))
        );
    }

    #[test]
    fn entries_resolve_from_root() {
        let (dir, r) = project();
        assert_eq!(r.resolve_entry("src/js/index.js"), Some(canon(&dir, "src/js/index.js")));
        assert_eq!(r.resolve_entry("src/js/index"), Some(canon(&dir, "src/js/index.js")));
        assert_eq!(r.resolve_entry("src/nope.js"), None);
    }

    #[test]
    fn external_specifiers() {
        assert!(is_external("https://cdn.example/lib.js"));
        assert!(is_external("//fonts.example/css"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("#section"));
        assert!(is_external("mailto:a@b.c"));
        assert!(!is_external("./local.js"));
        assert!(!is_external("images/logo.png"));
    }
}
