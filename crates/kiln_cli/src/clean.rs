//! `kiln clean`: remove build output and, optionally, the cache.

use std::error::Error;
use std::fs;

use kiln_cache::Cache;
use kiln_emit::OutputRoot;

use crate::project::prepare_request;
use crate::{CleanArgs, GlobalArgs};

/// Runs the `kiln clean` command.
pub fn run(args: &CleanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let request = prepare_request(global, &[], args.out.as_deref(), false)?;

    let output = OutputRoot::new(&request.output_dir(), &request.root)?;
    if output.dir().exists() {
        fs::remove_dir_all(output.dir())?;
        if !global.quiet {
            eprintln!("     Removed {}", output.dir().display());
        }
    }

    if args.cache {
        let dir = request.cache_dir();
        if dir.exists() {
            Cache::open(&dir).invalidate_all()?;
            fs::remove_dir_all(&dir)?;
            if !global.quiet {
                eprintln!("     Removed {}", dir.display());
            }
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::scaffold;

    fn global(root: &std::path::Path) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(root.to_string_lossy().into_owned()),
        }
    }

    fn build_once(root: &std::path::Path) {
        let config = kiln_config::load_config(root).unwrap();
        let outcome = kiln_pipeline::build(&kiln_pipeline::BuildRequest::new(root, config));
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn removes_output_but_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "site").unwrap();
        build_once(dir.path());
        assert!(dir.path().join("dist").is_dir());

        let args = CleanArgs {
            cache: false,
            out: None,
        };
        assert_eq!(run(&args, &global(dir.path())).unwrap(), 0);
        assert!(!dir.path().join("dist").exists());
        assert!(dir.path().join(".kiln-cache").exists());
        assert!(dir.path().join("src/index.html").exists());
    }

    #[test]
    fn cache_flag_removes_cache() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "site").unwrap();
        build_once(dir.path());

        let args = CleanArgs {
            cache: true,
            out: None,
        };
        assert_eq!(run(&args, &global(dir.path())).unwrap(), 0);
        assert!(!dir.path().join(".kiln-cache").exists());
    }

    #[test]
    fn refuses_output_dir_containing_project() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "site").unwrap();

        let args = CleanArgs {
            cache: false,
            out: Some(".".to_string()),
        };
        assert!(run(&args, &global(dir.path())).is_err());
        assert!(dir.path().join("kiln.toml").exists());
    }

    #[test]
    fn clean_without_output_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "site").unwrap();
        let args = CleanArgs {
            cache: true,
            out: None,
        };
        assert_eq!(run(&args, &global(dir.path())).unwrap(), 0);
    }
}
