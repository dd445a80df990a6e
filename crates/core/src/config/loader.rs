//! Configuration file loader for the `.recon-kit/` directory.
//!
//! A project is configured by a single `.recon-kit/config.toml`. The file
//! and the directory are both optional: anything missing falls back to the
//! defaults of [`ProjectConfig`].

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use rk_protocol::config_models::ProjectConfig;
use std::path::{Path, PathBuf};

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".recon-kit";

/// Path of the configuration file below `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join("config.toml")
}

/// Loads the project configuration below `root`.
///
/// # Arguments
///
/// * `root` - Directory containing the `.recon-kit/` folder
///
/// # Returns
///
/// The parsed and validated configuration. If `.recon-kit/` or its
/// `config.toml` is missing, returns the default configuration rather than
/// an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists but cannot be read
/// - The file is not valid TOML or has fields of the wrong type
/// - Values are out of range (see [`validate`])
///
/// # Example
///
/// ```rust,no_run
/// use rk_core::config::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Pipeline program: {}", config.pipeline.program);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<ProjectConfig> {
    let path = config_path(root);

    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: path.clone(),
            source,
        })?;

    let config: ProjectConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.clone(),
        source,
    })?;

    validate(&config).map_err(|reason| ConfigError::InvalidConfig { path, reason })?;

    Ok(config)
}

/// Checks value ranges that serde cannot express.
pub fn validate(config: &ProjectConfig) -> Result<(), String> {
    if config.pipeline.program.trim().is_empty() {
        return Err("pipeline.program must not be empty".to_string());
    }
    if config.pipeline.poll_interval_ms == 0 {
        return Err("pipeline.poll_interval_ms must be greater than zero".to_string());
    }

    let options = &config.pipeline.options;
    if !(0.0..=1.0).contains(&options.decimation_factor) {
        return Err(format!(
            "pipeline.options.decimation_factor must be within [0, 1], got {}",
            options.decimation_factor
        ));
    }

    let recon = &config.reconstruction;
    if recon.normal_neighbors < 3 {
        return Err("reconstruction.normal_neighbors must be at least 3".to_string());
    }
    if !(recon.radius_factor.is_finite() && recon.radius_factor > 0.0) {
        return Err("reconstruction.radius_factor must be a positive number".to_string());
    }
    if recon.radius_scales.is_empty() {
        return Err("reconstruction.radius_scales must not be empty".to_string());
    }
    if recon
        .radius_scales
        .iter()
        .any(|scale| !(scale.is_finite() && *scale > 0.0))
    {
        return Err("reconstruction.radius_scales must be positive numbers".to_string());
    }
    if recon.radius_scales.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err("reconstruction.radius_scales must be strictly ascending".to_string());
    }
    if recon.decimation_target == 0 {
        return Err("reconstruction.decimation_target must be greater than zero".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_protocol::config_models::{PersistedMesh, PlyEncoding};
    use std::fs;
    use tempfile::tempdir;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).expect("Failed to create .recon-kit");
        fs::write(dir.join("config.toml"), content).expect("Failed to write config.toml");
    }

    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_config(
            dir.path(),
            r#"
[pipeline]
program = "/usr/local/bin/mvs-pipeline"
poll_interval_ms = 500

[pipeline.options]
verbosity = 0
integrate_roi = true

[viewers.mesh]
program = "meshlab"

[reconstruction]
normal_neighbors = 16
decimation_target = 5000
persist = "cleaned"
format = "ascii"
"#,
        );

        let config = load_config(dir.path()).await.expect("Failed to load config");

        assert_eq!(config.pipeline.program, "/usr/local/bin/mvs-pipeline");
        assert_eq!(config.pipeline.poll_interval_ms, 500);
        assert_eq!(config.pipeline.options.verbosity, 0);
        assert!(config.pipeline.options.integrate_roi);
        assert_eq!(config.viewers.mesh.program, "meshlab");
        assert!(config.viewers.mesh.args.is_empty());
        assert_eq!(config.reconstruction.normal_neighbors, 16);
        assert_eq!(config.reconstruction.decimation_target, 5000);
        assert_eq!(config.reconstruction.persist, PersistedMesh::Cleaned);
        assert_eq!(config.reconstruction.format, PlyEncoding::Ascii);
    }

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .recon-kit");

        assert_eq!(config, ProjectConfig::default());
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_config(dir.path(), "[pipeline\nprogram = ");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_rejects_zero_poll_interval() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_config(dir.path(), "[pipeline]\npoll_interval_ms = 0\n");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::InvalidConfig { reason, .. }) = result {
            assert!(reason.contains("poll_interval_ms"));
        } else {
            panic!("Expected InvalidConfig error");
        }
    }

    #[tokio::test]
    async fn test_load_config_rejects_unsorted_radius_scales() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_config(dir.path(), "[reconstruction]\nradius_scales = [2.0, 1.0]\n");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::InvalidConfig { reason, .. }) = result {
            assert!(reason.contains("ascending"));
        } else {
            panic!("Expected InvalidConfig error");
        }
    }

    #[test]
    fn test_validate_defaults() {
        assert!(validate(&ProjectConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_decimation_factor_range() {
        let mut config = ProjectConfig::default();
        config.pipeline.options.decimation_factor = 1.5;
        assert!(validate(&config).is_err());
    }
}
