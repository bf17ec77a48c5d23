//! ASCII PLY export of the mesh layer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::tsdf::MeshLayer;

/// Write every mesh vertex with its color as a PLY point set.
///
/// Cells are written in block index order. Returns the vertex count.
pub fn write_mesh_ply(mesh_layer: &MeshLayer, path: &Path) -> std::io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let count = write_ply(mesh_layer, &mut writer)?;
    writer.flush()?;
    Ok(count)
}

fn write_ply<W: Write>(mesh_layer: &MeshLayer, writer: &mut W) -> std::io::Result<usize> {
    let mut cells: Vec<_> = mesh_layer.iter().collect();
    cells.sort_by_key(|(index, _)| **index);
    let count = mesh_layer.num_vertices();

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", count)?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property float {}", axis)?;
    }
    for channel in ["red", "green", "blue"] {
        writeln!(writer, "property uchar {}", channel)?;
    }
    writeln!(writer, "end_header")?;

    for (_, mesh) in cells {
        for (vertex, color) in mesh.vertices.iter().zip(&mesh.colors) {
            writeln!(
                writer,
                "{} {} {} {} {} {}",
                vertex.x, vertex.y, vertex.z, color.r, color.g, color.b
            )?;
        }
    }
    Ok(count)
}
