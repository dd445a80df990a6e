//! Embedded template files for `.recon-kit` initialization.
//!
//! Files from the repository root `templates/` directory are compiled into
//! the binary, so `recon-kit init` works without any files on disk.

use rust_embed::RustEmbed;

/// Embedded template files from the `templates/` directory.
///
/// - `CARGO_MANIFEST_DIR` = `crates/core`
/// - `../../templates` = repository root `templates/`
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../templates"]
pub struct TemplateAssets;

/// Get template file content by path.
///
/// # Arguments
/// * `path` - Relative path from templates root (e.g., "config.toml", "scripts/pipeline.sh")
///
/// # Example
/// ```
/// use rk_core::init::templates::get_template;
///
/// let config = get_template("config.toml").expect("config.toml should exist");
/// assert!(config.contains("[reconstruction]"));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// List all template files below a directory prefix.
pub fn list_templates(prefix: &str) -> Vec<String> {
    TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect()
}
