//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::template::{Placeholder, Template};
use crate::types::ProjectConfig;
use kiln_common::{AssetKind, BuildMode, TransformKind};
use std::path::Path;
use std::str::FromStr;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates `<project_dir>/kiln.toml`.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    check_transform_names(&table)?;
    let config: ProjectConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Rejects unknown transform names before typed deserialization so the error
/// names the offending transform instead of a generic parse failure.
fn check_transform_names(table: &toml::Table) -> Result<(), ConfigError> {
    if let Some(chains) = table.get("chains").and_then(toml::Value::as_table) {
        for (kind, steps) in chains {
            let Some(steps) = steps.as_array() else {
                continue;
            };
            for name in steps.iter().filter_map(toml::Value::as_str) {
                TransformKind::from_str(name).map_err(|_| ConfigError::UnknownTransform {
                    name: name.to_string(),
                    section: format!("chains.{kind}"),
                })?;
            }
        }
    }
    if let Some(transforms) = table.get("transforms").and_then(toml::Value::as_table) {
        for name in transforms.keys() {
            TransformKind::from_str(name).map_err(|_| ConfigError::UnknownTransform {
                name: name.clone(),
                section: "transforms".to_string(),
            })?;
        }
    }
    Ok(())
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.entries.is_empty() {
        return Err(ConfigError::MissingField("project.entries".to_string()));
    }

    for kind in AssetKind::ALL {
        for step in config.chains.for_kind(kind) {
            if step.input_kind() != kind {
                return Err(ConfigError::ValidationError(format!(
                    "transform '{step}' accepts {} input and cannot run in the {kind} chain",
                    step.input_kind()
                )));
            }
        }
    }

    for ext in &config.resolve.extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(ConfigError::ValidationError(format!(
                "resolve extension '{ext}' must start with '.'"
            )));
        }
    }
    for alias in config.resolve.aliases.keys() {
        if alias.is_empty() || alias.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "alias '{alias}' must be a single path segment"
            )));
        }
    }

    for name in [&config.output.bundle_name, &config.output.shared_name] {
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "chunk name '{name}' must be a non-empty file stem"
            )));
        }
    }

    for mode in [BuildMode::Development, BuildMode::Production] {
        validate_templates(config, mode)?;
    }

    if config.build.workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "build.workers must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Checks that each template parses and only uses the placeholders its mode
/// allows: `[hash]` is production-only and `[token]` development-only.
fn validate_templates(config: &ProjectConfig, mode: BuildMode) -> Result<(), ConfigError> {
    let (forbidden, other) = match mode {
        BuildMode::Development => (Placeholder::Hash, "production"),
        BuildMode::Production => (Placeholder::Token, "development"),
    };
    let templates = config.output.templates(mode);
    for (key, source) in templates.named() {
        let template = Template::parse(source)?;
        if template.uses(forbidden) {
            return Err(ConfigError::ValidationError(format!(
                "output.{mode}.{key}: {forbidden} is only valid in {other} templates"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkingPolicy, StyleDelivery};

    const MINIMAL: &str = r#"
[project]
name = "site"
entries = ["src/js/index.js"]
"#;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.project.name, "site");
        assert_eq!(config.project.version, "0.1.0");
        assert_eq!(config.project.mode, BuildMode::Production);
        assert_eq!(config.output.dir, Path::new("dist"));
        assert_eq!(config.output.styles, StyleDelivery::Extract);
        assert_eq!(config.output.chunking, ChunkingPolicy::PerEntry);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.dir, Path::new(".kiln-cache"));
        assert_eq!(config.build.workers, None);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "site"
version = "1.2.0"
entries = ["src/js/index.js", "src/index.html"]
mode = "development"

[resolve]
extensions = [".js", ".scss"]
packages = ["vendor"]

[resolve.aliases]
images = "assets/img"

[chains]
script = ["minify-script"]
style = ["preprocess", "minify-style"]
image = []

[transforms.vendor-prefix]
prefixes = ["-webkit-"]

[transforms.optimize-image]
strip_metadata = false

[output]
dir = "public"
styles = "inline"
chunking = "single"
bundle_name = "app"

[output.production]
script = "bundle.js"
style = "styles.css"

[cache]
enabled = false
gc_after_builds = 5

[watch]
debounce_ms = 300

[build]
workers = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.entries.len(), 2);
        assert_eq!(config.project.mode, BuildMode::Development);
        assert_eq!(config.resolve.extensions, vec![".js", ".scss"]);
        assert_eq!(config.resolve.aliases.len(), 1);
        assert_eq!(config.chains.script, vec![TransformKind::MinifyScript]);
        assert!(config.chains.image.is_empty());
        assert_eq!(config.chains.markup, vec![TransformKind::MinifyMarkup]);
        let opts = config.transform_options(TransformKind::OptimizeImage);
        assert_eq!(opts.get("strip_metadata"), Some(&toml::Value::Boolean(false)));
        assert!(config.transform_options(TransformKind::Downlevel).is_empty());
        assert_eq!(config.output.styles, StyleDelivery::Inline);
        assert_eq!(config.output.chunking, ChunkingPolicy::Single);
        assert_eq!(config.output.templates(BuildMode::Production).script, "bundle.js");
        assert!(!config.cache.enabled);
        assert_eq!(config.watch.debounce_ms, 300);
        assert_eq!(config.build.workers, Some(2));
    }

    #[test]
    fn missing_entries_errors() {
        let toml = r#"
[project]
name = "site"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "project.entries"));
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""
entries = ["a.js"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn unknown_chain_step_errors() {
        let toml = format!("{MINIMAL}\n[chains]\nscript = [\"downlevel\", \"uglify\"]\n");
        let err = load_config_from_str(&toml).unwrap_err();
        match err {
            ConfigError::UnknownTransform { name, section } => {
                assert_eq!(name, "uglify");
                assert_eq!(section, "chains.script");
            }
            other => panic!("expected UnknownTransform, got {other:?}"),
        }
    }

    #[test]
    fn unknown_transform_options_error() {
        let toml = format!("{MINIMAL}\n[transforms.cssnano]\npreset = \"default\"\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransform { .. }));
    }

    #[test]
    fn step_in_wrong_chain_errors() {
        let toml = format!("{MINIMAL}\n[chains]\nstyle = [\"downlevel\"]\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn hash_in_development_template_errors() {
        let toml = format!("{MINIMAL}\n[output.development]\nscript = \"[name].[hash].js\"\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(format!("{err}").contains("[hash] is only valid in production"));
    }

    #[test]
    fn token_in_production_template_errors() {
        let toml = format!("{MINIMAL}\n[output.production]\nasset = \"[dir]/[name].[token].[ext]\"\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_workers_errors() {
        let toml = format!("{MINIMAL}\n[build]\nworkers = 0\n");
        assert!(load_config_from_str(&toml).is_err());
    }

    #[test]
    fn unknown_section_field_errors() {
        let toml = format!("{MINIMAL}\n[output]\nfilename = \"x.js\"\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "site");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
