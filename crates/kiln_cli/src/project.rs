//! Project discovery shared by the commands.

use std::error::Error;
use std::path::{Path, PathBuf};

use kiln_config::{load_config, load_config_file, ProjectConfig, CONFIG_FILE_NAME};
use kiln_pipeline::BuildRequest;

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `kiln.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn Error>> {
    match &global.config {
        Some(config_path) => {
            let path = PathBuf::from(config_path);
            if path.is_file() {
                Ok(path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(path)
            }
        }
        None => find_project_root(&std::env::current_dir()?),
    }
}

/// Loads the configuration for `project_dir`, honouring a `--config` file.
pub fn load_project_config(
    project_dir: &Path,
    global: &GlobalArgs,
) -> Result<ProjectConfig, Box<dyn Error>> {
    let config = match &global.config {
        Some(path) if Path::new(path).is_file() => load_config_file(Path::new(path))?,
        _ => load_config(project_dir)?,
    };
    Ok(config)
}

/// Resolves the project and loads its configuration into a request with the
/// shared `--entry`, `--out` and `--no-cache` overrides applied.
pub fn prepare_request(
    global: &GlobalArgs,
    entries: &[String],
    out: Option<&str>,
    no_cache: bool,
) -> Result<BuildRequest, Box<dyn Error>> {
    let root = resolve_project_root(global)?;
    let config = load_project_config(&root, global)?;
    tracing::debug!(root = %root.display(), project = %config.project.name, "project resolved");
    let mut request = BuildRequest::new(root, config)
        .with_entries(entries.to_vec())
        .with_out_dir(out.map(PathBuf::from));
    if no_cache {
        request = request.without_cache();
    }
    Ok(request)
}
