//! PLY (polygon file format) codec.
//!
//! Reads `ascii`, `binary_little_endian` and `binary_big_endian` files with
//! any scalar property types. Only the `vertex` element (`x y z`, optional
//! `nx ny nz`) and the `face` element (`vertex_indices` or `vertex_index`
//! list) are interpreted; other elements and properties are skipped.
//! Polygons with more than three corners are split into a triangle fan.
//!
//! Writes `ascii` or `binary_little_endian` with `float` positions and
//! normals and `list uchar int vertex_indices` faces.

use crate::reconstruction::error::PlyError;
use crate::reconstruction::geometry::{Mesh, PointCloud};
use nalgebra::{Point3, Vector3};
use rk_protocol::config_models::PlyEncoding;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::SplitAsciiWhitespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => ScalarType::I8,
            "uchar" | "uint8" => ScalarType::U8,
            "short" | "int16" => ScalarType::I16,
            "ushort" | "uint16" => ScalarType::U16,
            "int" | "int32" => ScalarType::I32,
            "uint" | "uint32" => ScalarType::U32,
            "float" | "float32" => ScalarType::F32,
            "double" | "float64" => ScalarType::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

impl Element {
    fn position(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Header {
    format: Format,
    elements: Vec<Element>,
}

/// Geometry decoded from a PLY file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlyData {
    pub vertices: Vec<Point3<f64>>,
    pub normals: Option<Vec<Vector3<f64>>>,
    pub triangles: Vec<[usize; 3]>,
}

impl PlyData {
    pub fn into_point_cloud(self) -> PointCloud {
        PointCloud {
            points: self.vertices,
            normals: self.normals,
        }
    }

    pub fn into_mesh(self) -> Mesh {
        Mesh {
            vertices: self.vertices,
            triangles: self.triangles,
            vertex_normals: self.normals,
        }
    }
}

/// Read a PLY file from disk.
pub fn read_ply(path: &Path) -> Result<PlyData, PlyError> {
    let file = File::open(path)?;
    read_ply_from(BufReader::new(file))
}

/// Read a point cloud. Faces, if any, are ignored.
pub fn read_point_cloud(path: &Path) -> Result<PointCloud, PlyError> {
    read_ply(path).map(PlyData::into_point_cloud)
}

/// Read a triangle mesh.
pub fn read_mesh(path: &Path) -> Result<Mesh, PlyError> {
    read_ply(path).map(PlyData::into_mesh)
}

/// Decode PLY data from a buffered reader.
pub fn read_ply_from<R: BufRead>(mut reader: R) -> Result<PlyData, PlyError> {
    let header = parse_header(&mut reader)?;

    match header.format {
        Format::Ascii => {
            let mut body = String::new();
            reader.read_to_string(&mut body)?;
            let mut source = AsciiSource {
                tokens: body.split_ascii_whitespace(),
            };
            decode_body(&header, &mut source)
        }
        Format::BinaryLittleEndian | Format::BinaryBigEndian => {
            let mut source = BinarySource {
                reader,
                big_endian: header.format == Format::BinaryBigEndian,
            };
            decode_body(&header, &mut source)
        }
    }
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<Header, PlyError> {
    let mut line = String::new();
    let next_line = |reader: &mut R, line: &mut String| -> Result<bool, PlyError> {
        line.clear();
        Ok(reader.read_line(line)? > 0)
    };

    if !next_line(reader, &mut line)? || line.trim_end() != "ply" {
        return Err(PlyError::Header("missing 'ply' magic".to_string()));
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    loop {
        if !next_line(reader, &mut line)? {
            return Err(PlyError::Header("missing 'end_header'".to_string()));
        }
        let mut words = line.split_ascii_whitespace();
        match words.next() {
            None | Some("comment") | Some("obj_info") => {}
            Some("end_header") => break,
            Some("format") => {
                format = Some(match words.next() {
                    Some("ascii") => Format::Ascii,
                    Some("binary_little_endian") => Format::BinaryLittleEndian,
                    Some("binary_big_endian") => Format::BinaryBigEndian,
                    other => {
                        return Err(PlyError::Header(format!(
                            "unsupported format {:?}",
                            other.unwrap_or("")
                        )))
                    }
                });
            }
            Some("element") => {
                let name = words
                    .next()
                    .ok_or_else(|| PlyError::Header("element without a name".to_string()))?;
                let count = words
                    .next()
                    .and_then(|c| c.parse::<usize>().ok())
                    .ok_or_else(|| PlyError::Header(format!("element '{name}' has no valid count")))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| PlyError::Header("property before any element".to_string()))?;
                element.properties.push(parse_property(words)?);
            }
            Some(other) => {
                return Err(PlyError::Header(format!("unknown keyword '{other}'")));
            }
        }
    }

    let format = format.ok_or_else(|| PlyError::Header("missing 'format' line".to_string()))?;
    Ok(Header { format, elements })
}

fn parse_property(mut words: SplitAsciiWhitespace<'_>) -> Result<Property, PlyError> {
    let scalar = |word: Option<&str>| {
        let word = word.unwrap_or("");
        ScalarType::parse(word).ok_or_else(|| PlyError::Header(format!("unknown property type '{word}'")))
    };

    let kind = match words.next() {
        Some("list") => {
            let count = scalar(words.next())?;
            let item = scalar(words.next())?;
            PropertyKind::List { count, item }
        }
        word => PropertyKind::Scalar(scalar(word)?),
    };
    let name = words
        .next()
        .ok_or_else(|| PlyError::Header("property without a name".to_string()))?;

    Ok(Property {
        name: name.to_string(),
        kind,
    })
}

/// Sequential access to the values of a PLY body.
trait ValueSource {
    fn scalar(&mut self, ty: ScalarType, element: &str) -> Result<f64, PlyError>;
}

struct AsciiSource<'a> {
    tokens: SplitAsciiWhitespace<'a>,
}

impl ValueSource for AsciiSource<'_> {
    fn scalar(&mut self, ty: ScalarType, element: &str) -> Result<f64, PlyError> {
        let token = self.tokens.next().ok_or_else(|| PlyError::UnexpectedEof {
            element: element.to_string(),
        })?;
        // Parse floats at their declared width so written values read back bit-exact.
        let parsed = match ty {
            ScalarType::F32 => token.parse::<f32>().map(f64::from).ok(),
            _ => token.parse::<f64>().ok(),
        };
        parsed.ok_or_else(|| PlyError::Body(format!("'{token}' is not a number in element '{element}'")))
    }
}

struct BinarySource<R> {
    reader: R,
    big_endian: bool,
}

impl<R: Read> ValueSource for BinarySource<R> {
    fn scalar(&mut self, ty: ScalarType, element: &str) -> Result<f64, PlyError> {
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..ty.size()];
        self.reader.read_exact(bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PlyError::UnexpectedEof {
                    element: element.to_string(),
                }
            } else {
                PlyError::Io(e)
            }
        })?;
        if self.big_endian {
            bytes.reverse();
        }
        // Bytes are now little endian.
        Ok(match ty {
            ScalarType::I8 => i8::from_le_bytes([bytes[0]]) as f64,
            ScalarType::U8 => bytes[0] as f64,
            ScalarType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ScalarType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ScalarType::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            ScalarType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            ScalarType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            ScalarType::F64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        })
    }
}

/// One decoded property value.
enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

fn read_row<S: ValueSource>(source: &mut S, element: &Element, row: &mut Vec<Value>) -> Result<(), PlyError> {
    row.clear();
    for property in &element.properties {
        match property.kind {
            PropertyKind::Scalar(ty) => row.push(Value::Scalar(source.scalar(ty, &element.name)?)),
            PropertyKind::List { count, item } => {
                let n = source.scalar(count, &element.name)?;
                if !(n >= 0.0 && n.fract() == 0.0) {
                    return Err(PlyError::Body(format!(
                        "invalid list length {n} in element '{}'",
                        element.name
                    )));
                }
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n as usize {
                    items.push(source.scalar(item, &element.name)?);
                }
                row.push(Value::List(items));
            }
        }
    }
    Ok(())
}

fn scalar_at(row: &[Value], index: usize) -> f64 {
    match &row[index] {
        Value::Scalar(v) => *v,
        Value::List(items) => items.first().copied().unwrap_or(0.0),
    }
}

fn decode_body<S: ValueSource>(header: &Header, source: &mut S) -> Result<PlyData, PlyError> {
    let mut data = PlyData::default();
    let mut saw_vertex = false;
    let mut row = Vec::new();

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                saw_vertex = true;
                let xyz = ["x", "y", "z"].map(|n| element.position(n));
                let [Some(x), Some(y), Some(z)] = xyz else {
                    return Err(PlyError::Header("vertex element lacks x, y or z".to_string()));
                };
                let normal = match ["nx", "ny", "nz"].map(|n| element.position(n)) {
                    [Some(nx), Some(ny), Some(nz)] => Some((nx, ny, nz)),
                    _ => None,
                };

                data.vertices.reserve(element.count);
                let mut normals = normal.map(|_| Vec::with_capacity(element.count));
                for _ in 0..element.count {
                    read_row(source, element, &mut row)?;
                    data.vertices.push(Point3::new(
                        scalar_at(&row, x),
                        scalar_at(&row, y),
                        scalar_at(&row, z),
                    ));
                    if let (Some((nx, ny, nz)), Some(normals)) = (normal, normals.as_mut()) {
                        normals.push(Vector3::new(
                            scalar_at(&row, nx),
                            scalar_at(&row, ny),
                            scalar_at(&row, nz),
                        ));
                    }
                }
                data.normals = normals;
            }
            "face" => {
                let indices = element
                    .position("vertex_indices")
                    .or_else(|| element.position("vertex_index"))
                    .ok_or_else(|| PlyError::Header("face element lacks vertex_indices".to_string()))?;

                data.triangles.reserve(element.count);
                for _ in 0..element.count {
                    read_row(source, element, &mut row)?;
                    let Value::List(corners) = &row[indices] else {
                        return Err(PlyError::Header("vertex_indices must be a list".to_string()));
                    };
                    let corners = corners
                        .iter()
                        .map(|&c| vertex_index(c, data.vertices.len(), saw_vertex))
                        .collect::<Result<Vec<_>, _>>()?;
                    for k in 1..corners.len().saturating_sub(1) {
                        data.triangles.push([corners[0], corners[k], corners[k + 1]]);
                    }
                }
            }
            _ => {
                for _ in 0..element.count {
                    read_row(source, element, &mut row)?;
                }
            }
        }
    }

    if !saw_vertex {
        return Err(PlyError::Header("no vertex element".to_string()));
    }
    Ok(data)
}

fn vertex_index(value: f64, vertex_count: usize, saw_vertex: bool) -> Result<usize, PlyError> {
    if !saw_vertex {
        return Err(PlyError::Header("face element precedes vertex element".to_string()));
    }
    if value < 0.0 || value.fract() != 0.0 || value >= vertex_count as f64 {
        return Err(PlyError::IndexOutOfRange {
            index: value as i64,
            vertex_count,
        });
    }
    Ok(value as usize)
}

/// Write a point cloud.
pub fn write_point_cloud(path: &Path, cloud: &PointCloud, encoding: PlyEncoding) -> Result<(), PlyError> {
    let normals = cloud.normals.as_deref().filter(|n| n.len() == cloud.len());
    write_to_file(path, &cloud.points, normals, &[], encoding)
}

/// Write a triangle mesh, including vertex normals when present.
pub fn write_mesh(path: &Path, mesh: &Mesh, encoding: PlyEncoding) -> Result<(), PlyError> {
    let normals = mesh
        .vertex_normals
        .as_deref()
        .filter(|n| n.len() == mesh.num_vertices());
    write_to_file(path, &mesh.vertices, normals, &mesh.triangles, encoding)
}

fn write_to_file(
    path: &Path,
    vertices: &[Point3<f64>],
    normals: Option<&[Vector3<f64>]>,
    triangles: &[[usize; 3]],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ply_to(&mut writer, vertices, normals, triangles, encoding)?;
    writer.flush()?;
    Ok(())
}

/// Encode geometry as PLY into `writer`.
pub fn write_ply_to<W: Write>(
    writer: &mut W,
    vertices: &[Point3<f64>],
    normals: Option<&[Vector3<f64>]>,
    triangles: &[[usize; 3]],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    let format = match encoding {
        PlyEncoding::Ascii => "ascii",
        PlyEncoding::Binary => "binary_little_endian",
    };
    writeln!(writer, "ply")?;
    writeln!(writer, "format {format} 1.0")?;
    writeln!(writer, "comment written by recon-kit")?;
    writeln!(writer, "element vertex {}", vertices.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property float {axis}")?;
    }
    if normals.is_some() {
        for axis in ["nx", "ny", "nz"] {
            writeln!(writer, "property float {axis}")?;
        }
    }
    if !triangles.is_empty() {
        writeln!(writer, "element face {}", triangles.len())?;
        writeln!(writer, "property list uchar int vertex_indices")?;
    }
    writeln!(writer, "end_header")?;

    for (i, v) in vertices.iter().enumerate() {
        let mut values = vec![v.x as f32, v.y as f32, v.z as f32];
        if let Some(normals) = normals {
            let n = normals[i];
            values.extend([n.x as f32, n.y as f32, n.z as f32]);
        }
        match encoding {
            PlyEncoding::Ascii => {
                let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                writeln!(writer, "{}", line.join(" "))?;
            }
            PlyEncoding::Binary => {
                for value in values {
                    writer.write_all(&value.to_le_bytes())?;
                }
            }
        }
    }

    for triangle in triangles {
        let mut corners = [0i32; 3];
        for (slot, &index) in corners.iter_mut().zip(triangle) {
            *slot = i32::try_from(index).map_err(|_| {
                PlyError::Body(format!("vertex index {index} does not fit in a PLY int"))
            })?;
        }
        match encoding {
            PlyEncoding::Ascii => writeln!(writer, "3 {} {} {}", corners[0], corners[1], corners[2])?,
            PlyEncoding::Binary => {
                writer.write_all(&[3u8])?;
                for corner in corners {
                    writer.write_all(&corner.to_le_bytes())?;
                }
            }
        }
    }

    Ok(())
}
