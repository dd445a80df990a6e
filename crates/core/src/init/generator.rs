//! Directory structure and file generation for `.recon-kit` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for initializing a `.recon-kit` directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where `.recon-kit` will be created.
    pub target_dir: PathBuf,

    /// Overwrite an existing `.recon-kit` directory.
    pub force: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
        }
    }
}

/// Generate the `.recon-kit` directory structure with templates.
///
/// ```text
/// .recon-kit/
/// ├── config.toml
/// └── scripts/
///     └── pipeline.sh
/// ```
///
/// # Errors
/// - `DirectoryExists` if `.recon-kit` exists and `force` is not set
/// - `TemplateNotFound` if an embedded template is missing
/// - `DirectoryCreate` / `FileWrite` on file system failures
pub async fn generate_project_structure(options: InitOptions) -> InitResult<()> {
    let rk_dir = options.target_dir.join(CONFIG_DIR);

    if rk_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(rk_dir));
    }

    fs::create_dir_all(&rk_dir).map_err(|source| InitError::DirectoryCreate {
        path: rk_dir.clone(),
        source,
    })?;

    write_template_file(&rk_dir, "config.toml")?;

    for script in list_templates("scripts/") {
        let target = write_template_file(&rk_dir, &script)?;
        make_executable(&target)?;
    }

    Ok(())
}

/// Write one embedded template below `rk_dir`, returning the written path.
fn write_template_file(rk_dir: &Path, template_path: &str) -> InitResult<PathBuf> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = rk_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path.clone(),
        source,
    })?;

    Ok(target_path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> InitResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|source| {
        InitError::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> InitResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_generate_structure_success() {
        let dir = tempdir().unwrap();
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
        };

        let result = generate_project_structure(options).await;
        assert!(result.is_ok(), "Failed: {:?}", result.err());

        let rk_dir = dir.path().join(".recon-kit");
        let config = fs::read_to_string(rk_dir.join("config.toml")).unwrap();
        assert!(config.contains("[pipeline]"));

        let script = rk_dir.join("scripts/pipeline.sh");
        assert!(script.exists(), "pipeline.sh should exist");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&script).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111, "pipeline.sh should be executable");
        }
    }

    #[tokio::test]
    async fn test_generated_config_loads() {
        let dir = tempdir().unwrap();
        generate_project_structure(InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
        })
        .await
        .unwrap();

        let config = crate::config::load_config(dir.path()).await.unwrap();
        assert_eq!(config.pipeline.program, ".recon-kit/scripts/pipeline.sh");
    }

    #[tokio::test]
    async fn test_generate_structure_exists_without_force() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".recon-kit")).unwrap();

        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
        };

        let result = generate_project_structure(options).await;
        assert!(
            matches!(result, Err(InitError::DirectoryExists(_))),
            "Should return DirectoryExists error"
        );
    }

    #[tokio::test]
    async fn test_generate_structure_exists_with_force() {
        let dir = tempdir().unwrap();
        let rk_dir = dir.path().join(".recon-kit");
        fs::create_dir_all(&rk_dir).unwrap();
        fs::write(rk_dir.join("config.toml"), "stale = true").unwrap();

        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: true,
        };

        generate_project_structure(options).await.unwrap();

        let config = fs::read_to_string(rk_dir.join("config.toml")).unwrap();
        assert!(!config.contains("stale"), "config.toml should be overwritten");
    }

    #[test]
    fn test_default_init_options() {
        let options = InitOptions::default();
        assert!(!options.force, "Default force should be false");
    }
}
