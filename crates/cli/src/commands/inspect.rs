use crate::cli::InspectArgs;
use rk_core::reconstruction::load_mesh;
use serde_json::json;

/// Print counts and topology statistics of a PLY file.
pub fn execute(args: InspectArgs) -> color_eyre::Result<()> {
    let mesh = load_mesh(&args.path)?;
    let bounds = mesh
        .bounds()
        .map(|(min, max)| [[min.x, min.y, min.z], [max.x, max.y, max.z]]);
    let stats = json!({
        "path": args.path.display().to_string(),
        "vertices": mesh.num_vertices(),
        "triangles": mesh.num_triangles(),
        "normals": mesh.vertex_normals.is_some(),
        "bounds": bounds,
        "surface_area": mesh.surface_area(),
        "duplicated_vertices": mesh.duplicated_vertex_count(),
        "non_manifold_edges": mesh.non_manifold_edges().len(),
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", args.path.display());
    println!("  vertices:            {}", mesh.num_vertices());
    println!("  triangles:           {}", mesh.num_triangles());
    println!("  normals:             {}", if mesh.vertex_normals.is_some() { "yes" } else { "no" });
    if let Some([min, max]) = bounds {
        println!("  bounds:              {min:?} .. {max:?}");
    }
    println!("  surface area:        {:.6}", mesh.surface_area());
    println!("  duplicated vertices: {}", mesh.duplicated_vertex_count());
    println!("  non-manifold edges:  {}", mesh.non_manifold_edges().len());
    Ok(())
}
