//! Minimal OBJ parser for the instanced coral meshes.
//!
//! Malformed lines are skipped with a warning; the load fails only when no
//! usable geometry survives. Polygon faces are fan-triangulated.

use super::Vertex;
use anyhow::{bail, Context, Result};
use std::path::Path;

#[derive(Debug, Default)]
pub struct ObjMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

pub fn load_obj(path: &Path) -> Result<ObjMesh> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mesh = parse_obj(&text)?;
    log::info!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len() / 3
    );
    Ok(mesh)
}

pub fn parse_obj(text: &str) -> Result<ObjMesh> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut mesh = ObjMesh::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let keyword = fields.next().unwrap_or_default();
        let result = match keyword {
            "v" => parse_floats(&mut fields).map(|p| positions.push(p)),
            "vn" => parse_floats(&mut fields).map(|n| normals.push(n)),
            "vt" => parse_floats(&mut fields).map(|t: [f32; 2]| uvs.push(t)),
            "f" => parse_face(&mut fields, &positions, &normals, &uvs, &mut mesh),
            // Groups, materials, smoothing: not used.
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("obj line {}: {err}: {line:?}", line_no + 1);
        }
    }

    if mesh.vertices.is_empty() || mesh.indices.is_empty() {
        bail!("no usable geometry");
    }
    Ok(mesh)
}

fn parse_floats<'a, const N: usize>(
    fields: &mut impl Iterator<Item = &'a str>,
) -> Result<[f32; N]> {
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = fields
            .next()
            .context("missing component")?
            .parse()
            .context("bad number")?;
    }
    Ok(out)
}

/// `f v/vt/vn ...` with 3+ corners; negative references index from the end.
fn parse_face<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    mesh: &mut ObjMesh,
) -> Result<()> {
    let mut corners = Vec::new();
    for field in fields {
        let mut refs = field.split('/');
        let pos = resolve(refs.next(), positions.len()).context("bad vertex reference")?;
        let uv = match refs.next().filter(|s| !s.is_empty()) {
            Some(s) => Some(resolve(Some(s), uvs.len()).context("bad uv reference")?),
            None => None,
        };
        let normal = match refs.next().filter(|s| !s.is_empty()) {
            Some(s) => Some(resolve(Some(s), normals.len()).context("bad normal reference")?),
            None => None,
        };
        corners.push(Vertex {
            position: positions[pos],
            normal: normal.map(|i| normals[i]).unwrap_or([0.0, 1.0, 0.0]),
            uv: uv.map(|i| uvs[i]).unwrap_or([0.0, 0.0]),
        });
    }
    if corners.len() < 3 {
        bail!("face with fewer than 3 corners");
    }

    let base = mesh.vertices.len() as u32;
    mesh.vertices.extend_from_slice(&corners);
    for i in 1..corners.len() as u32 - 1 {
        mesh.indices.extend_from_slice(&[base, base + i, base + i + 1]);
    }
    Ok(())
}

fn resolve(field: Option<&str>, len: usize) -> Result<usize> {
    let raw: i64 = field.context("missing reference")?.parse()?;
    let index = if raw < 0 {
        len as i64 + raw
    } else {
        raw - 1
    };
    if index < 0 || index as usize >= len {
        bail!("reference {raw} out of range");
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
vn 0 1 0
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn fan_triangulates_quads() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn skips_malformed_lines_keeps_valid() {
        let text = format!("vn zero one zero\nf 9 9 9\n{QUAD}");
        let mesh = parse_obj(&text).unwrap();
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn fully_invalid_input_is_an_error() {
        assert!(parse_obj("v 0 0\nf 1 2 3\n").is_err());
        assert!(parse_obj("").is_err());
    }

    #[test]
    fn negative_references_count_from_end() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
    }
}
