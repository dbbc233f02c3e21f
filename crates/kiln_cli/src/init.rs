//! `kiln init`: project scaffolding.
//!
//! Creates a `kiln.toml`, a markup entry that links a script and a
//! stylesheet, a logo under the default `images` alias and an empty `fonts`
//! directory.

use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_config::CONFIG_FILE_NAME;

use crate::GlobalArgs;

/// Runs the `kiln init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    if project_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(format!(
            "{CONFIG_FILE_NAME} already exists in {}",
            project_dir.display()
        )
        .into());
    }

    let project_name = project_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .unwrap_or_else(|| "site".to_string());

    if !global.quiet {
        eprintln!("  Creating new Kiln project `{project_name}`");
    }
    let created = scaffold(&project_dir, &project_name)?;
    if !global.quiet {
        for path in created {
            eprintln!("     Created {}", path.display());
        }
    }
    Ok(0)
}

/// Writes the starter project into `root` and returns the created files.
pub(crate) fn scaffold(root: &Path, name: &str) -> io::Result<Vec<PathBuf>> {
    for dir in ["src/js", "src/css", "src/assets/images", "src/assets/fonts"] {
        fs::create_dir_all(root.join(dir))?;
    }

    let files = [
        (CONFIG_FILE_NAME.to_string(), config_template(name)),
        ("src/index.html".to_string(), markup_template(name)),
        ("src/js/index.js".to_string(), SCRIPT.to_string()),
        ("src/css/main.css".to_string(), STYLE.to_string()),
        ("src/assets/images/logo.svg".to_string(), LOGO.to_string()),
    ];
    let mut created = Vec::with_capacity(files.len());
    for (rel, content) in files {
        let path = root.join(rel);
        fs::write(&path, content)?;
        created.push(path);
    }
    Ok(created)
}

fn config_template(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
version = "0.1.0"
entries = ["src/index.html"]
mode = "production"

[resolve]
aliases = {{ images = "src/assets/images", fonts = "src/assets/fonts" }}

[output]
dir = "dist"
styles = "extract"
chunking = "per-entry"

[cache]
dir = ".kiln-cache"
"#
    )
}

fn markup_template(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{name}</title>
    <link rel="stylesheet" href="./css/main.css">
  </head>
  <body>
    <img src="images/logo.svg" alt="{name}">
    <script src="./js/index.js"></script>
  </body>
</html>
"#
    )
}

const SCRIPT: &str = "const greeting = document.createElement('p');\n\
greeting.textContent = 'Hello from Kiln';\n\
document.body.appendChild(greeting);\n";

const STYLE: &str = "body {\n  margin: 0;\n  font-family: sans-serif;\n}\n\n\
header {\n  background: url(images/logo.svg) no-repeat;\n}\n";

const LOGO: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"32\" height=\"32\">\n\
  <!-- logo -->\n  <rect width=\"32\" height=\"32\" fill=\"#c2410c\"/>\n</svg>\n";
