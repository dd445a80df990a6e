//! Command line tests for the `recon-kit` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const TETRAHEDRON: &str = "ply
format ascii 1.0
comment unit tetrahedron
element vertex 4
property float x
property float y
property float z
element face 4
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
0 1 0
0 0 1
3 0 2 1
3 0 1 3
3 0 3 2
3 1 2 3
";

fn recon_kit(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("recon-kit").unwrap();
    cmd.arg("--project").arg(project);
    cmd
}

#[test]
fn test_init_creates_config() {
    let dir = tempdir().unwrap();

    recon_kit(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    assert!(dir.path().join(".recon-kit/config.toml").exists());
    assert!(dir.path().join(".recon-kit/scripts/pipeline.sh").exists());
}

#[test]
fn test_init_twice_requires_force() {
    let dir = tempdir().unwrap();
    recon_kit(dir.path()).arg("init").assert().success();

    recon_kit(dir.path()).arg("init").assert().failure();
    recon_kit(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_inspect_json() {
    let dir = tempdir().unwrap();
    let mesh = dir.path().join("tetra.ply");
    std::fs::write(&mesh, TETRAHEDRON).unwrap();

    recon_kit(dir.path())
        .arg("inspect")
        .arg(&mesh)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"triangles\": 4"))
        .stdout(predicate::str::contains("\"vertices\": 4"))
        .stdout(predicate::str::contains("\"non_manifold_edges\": 0"))
        .stdout(predicate::str::contains("\"surface_area\": 2.36"));
}

#[test]
fn test_inspect_missing_file_fails() {
    let dir = tempdir().unwrap();

    recon_kit(dir.path())
        .args(["inspect", "does-not-exist.ply"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".recon-kit")).unwrap();
    std::fs::write(dir.path().join(".recon-kit/config.toml"), "[pipeline]\npoll_interval_ms = 0\n").unwrap();

    recon_kit(dir.path())
        .args(["run", "-i", "images", "-o", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}

#[test]
fn test_run_missing_program_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("no-such-pipeline");

    recon_kit(dir.path())
        .args(["run", "-i", "images", "-o", "out", "--program"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to launch"));
}

#[cfg(unix)]
#[test]
fn test_run_forwards_program_output() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let script = dir.path().join("pipeline.sh");
    std::fs::write(&script, "#!/bin/sh\necho \"dense cloud for $2\"\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    recon_kit(dir.path())
        .args(["run", "-i", "images", "-o", "out", "--program"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("dense cloud for images"));
}

#[test]
fn test_reconstruct_needs_paths() {
    let dir = tempdir().unwrap();

    recon_kit(dir.path())
        .arg("reconstruct")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cloud"));
}
