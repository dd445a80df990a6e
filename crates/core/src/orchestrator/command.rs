//! Invocation building for the external pipeline program.

use rk_protocol::job_models::PipelineOptions;
use std::path::{Path, PathBuf};

/// Build the argument vector passed to the pipeline program.
///
/// The flag order is fixed:
/// `-i -o -m -e -v -s -d -r -t -p -x`. Booleans are passed as `0`/`1` and the
/// decimation factor always carries a decimal point (`1.0`, `0.25`).
///
/// # Example
///
/// ```
/// use rk_core::orchestrator::command::build_args;
/// use rk_protocol::job_models::PipelineOptions;
/// use std::path::Path;
///
/// let args = build_args(Path::new("imgs"), Path::new("out"), &PipelineOptions::default());
/// assert_eq!(args.join(" "), "-i imgs -o out -m 3200 -e 2 -v 2 -s 1.0 -d 0 -r 0 -t 2 -p 2 -x 1");
/// ```
pub fn build_args(input_dir: &Path, output_dir: &Path, options: &PipelineOptions) -> Vec<String> {
    let flags: [(&str, String); 11] = [
        ("-i", input_dir.display().to_string()),
        ("-o", output_dir.display().to_string()),
        ("-m", options.max_resolution.to_string()),
        ("-e", options.estimate_roi.to_string()),
        ("-v", options.verbosity.to_string()),
        ("-s", format_float(options.decimation_factor)),
        ("-d", bool_flag(options.remove_dense_maps)),
        ("-r", bool_flag(options.integrate_roi)),
        ("-t", options.smoothing_iterations.to_string()),
        ("-p", options.min_point_distance.to_string()),
        ("-x", options.export_type.flag_value().to_string()),
    ];

    flags
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value])
        .collect()
}

/// Format a float so that whole numbers keep their decimal point.
pub fn format_float(value: f64) -> String {
    // Debug formatting prints `1.0` where Display would print `1`.
    format!("{value:?}")
}

fn bool_flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Resolve the program to an executable path.
///
/// Names containing a path separator are used as given (relative names are
/// resolved against the working directory by the OS). Bare names are looked
/// up on `PATH`.
pub fn resolve_program(program: &str) -> Result<PathBuf, which::Error> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    which::which(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_protocol::job_models::ExportType;

    #[test]
    fn test_build_args_order() {
        let options = PipelineOptions {
            max_resolution: 2560,
            estimate_roi: 1,
            verbosity: 0,
            decimation_factor: 0.5,
            remove_dense_maps: true,
            integrate_roi: true,
            smoothing_iterations: 4,
            min_point_distance: 3,
            export_type: ExportType::Obj,
        };

        let args = build_args(Path::new("/data/images"), Path::new("/data/out"), &options);

        assert_eq!(
            args.join(" "),
            "-i /data/images -o /data/out -m 2560 -e 1 -v 0 -s 0.5 -d 1 -r 1 -t 4 -p 3 -x 0"
        );
    }

    #[test]
    fn test_build_args_is_deterministic() {
        let options = PipelineOptions::default();
        let first = build_args(Path::new("in"), Path::new("out"), &options);
        for _ in 0..10 {
            assert_eq!(build_args(Path::new("in"), Path::new("out"), &options), first);
        }
        assert_eq!(first.len(), 22, "Should have eleven flag/value pairs");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(0.25), "0.25");
    }

    #[test]
    fn test_resolve_program_with_path_is_unchanged() {
        let resolved = resolve_program("./tools/pipeline.sh").unwrap();
        assert_eq!(resolved, PathBuf::from("./tools/pipeline.sh"));
    }

    #[test]
    fn test_resolve_missing_bare_program() {
        assert!(resolve_program("nonexistent-pipeline-xyz").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_bare_program_on_path() {
        let resolved = resolve_program("sh").expect("sh should be on PATH");
        assert!(resolved.is_absolute());
    }
}
