//! Fixture programs and settings.

use rk_protocol::config_models::PipelineSettings;
use std::path::{Path, PathBuf};

/// Write an executable shell script named `name` into `dir`.
#[allow(dead_code)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}

/// Settings running `program` with a short poll interval.
#[allow(dead_code)]
pub fn fast_settings(program: &Path) -> PipelineSettings {
    PipelineSettings {
        program: program.display().to_string(),
        poll_interval_ms: 10,
        ..PipelineSettings::default()
    }
}
