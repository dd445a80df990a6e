//! End-to-end reconstruction from a point cloud artifact on disk.

use nalgebra::Point3;
use rk_core::reconstruction::geometry::fibonacci_sphere;
use rk_core::reconstruction::ply::write_point_cloud;
use rk_core::reconstruction::{
    load_mesh, ReconstructionEngine, ReconstructionError, ReconstructionRequest, MESH_FILE,
    POINT_CLOUD_FILE,
};
use rk_protocol::config_models::{PersistedMesh, PlyEncoding, ReconstructionSettings};
use tempfile::tempdir;

#[test]
fn test_output_directory_round_trip() {
    // Given: a pipeline output directory holding a dense cloud without normals
    let dir = tempdir().unwrap();
    let mut cloud = fibonacci_sphere(Point3::new(2.0, -1.0, 0.5), 3.0, 400);
    cloud.normals = None;
    write_point_cloud(&dir.path().join(POINT_CLOUD_FILE), &cloud, PlyEncoding::Ascii).unwrap();

    // When: the engine reconstructs it
    let engine = ReconstructionEngine::new(ReconstructionSettings {
        format: PlyEncoding::Ascii,
        ..ReconstructionSettings::default()
    });
    let report = engine
        .reconstruct(&ReconstructionRequest::for_output_dir(dir.path()).with_decimation_target(150))
        .unwrap();

    // Then: the candidate mesh is written next to the cloud
    assert_eq!(report.points, 400);
    assert!(report.estimated_normals);
    assert!(report.average_spacing > 0.0);
    assert_eq!(report.radii.len(), 2);
    assert_eq!(report.persisted, PersistedMesh::Candidate);
    assert!(report.candidate_triangles > 0);
    assert!(report.cleaned_triangles <= 150);

    let mesh = load_mesh(&dir.path().join(MESH_FILE)).unwrap();
    assert_eq!(mesh.num_triangles(), report.written_triangles);
    assert_eq!(mesh.num_vertices(), 400);
    assert!(mesh.vertex_normals.is_some(), "Mesh should carry the vertex normals");

    // Every vertex stays on the sphere
    let center = Point3::new(2.0, -1.0, 0.5);
    for v in &mesh.vertices {
        assert!(((v - center).norm() - 3.0).abs() < 1e-5);
    }
}

#[test]
fn test_corrupt_cloud_writes_nothing() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(POINT_CLOUD_FILE), "ply\nformat ascii 1.0\nelement vertex 3\n").unwrap();

    let result = ReconstructionEngine::default().reconstruct(&ReconstructionRequest::for_output_dir(dir.path()));

    assert!(matches!(result, Err(ReconstructionError::ArtifactRead { .. })));
    assert!(!dir.path().join(MESH_FILE).exists());
}

#[test]
fn test_two_point_cloud_rejected() {
    let dir = tempdir().unwrap();
    let cloud = rk_core::reconstruction::PointCloud::new(vec![Point3::origin(), Point3::new(0.0, 1.0, 0.0)]);
    write_point_cloud(&dir.path().join(POINT_CLOUD_FILE), &cloud, PlyEncoding::Binary).unwrap();

    let result = ReconstructionEngine::default().reconstruct(&ReconstructionRequest::for_output_dir(dir.path()));

    assert!(matches!(result, Err(ReconstructionError::InsufficientPoints { found: 2 })));
    assert!(!dir.path().join(MESH_FILE).exists());
}
