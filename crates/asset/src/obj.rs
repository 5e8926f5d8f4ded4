//! Line-oriented OBJ subset parser: `v` positions and `f` faces.
//!
//! Everything else (comments, `vt`, `vn`, groups, materials, unknown tags)
//! is ignored. Malformed `v`/`f` records are skipped with a warning instead
//! of failing the whole load; index validation happens once all lines have
//! been read (see [`MeshData::from_polygons`]).

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use thiserror::Error;

use crate::{MeshError, MeshResult, mesh::MeshData};

/// Per-line problem. Recoverable: the line is dropped and parsing continues.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LineError {
    #[error("'{tag}' record expects {expected} values, found {found}")]
    WrongTokenCount {
        tag: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("invalid number '{0}'")]
    BadNumber(String),
}

/// One parsed line.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Position([f32; 3]),
    /// Face vertex references as written (1-based, or negative = relative).
    Face(Vec<i64>),
    Ignored,
}

/// A face reference list as read from the file, not yet bounds-checked.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFace {
    /// 1-based source line.
    pub line: usize,
    /// `(as_written, resolved_zero_based)` pairs.
    pub refs: Vec<(i64, i64)>,
}

/// Output of a full parse, before triangulation and normal generation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedObj {
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<RawFace>,
    pub skipped_lines: usize,
}

/// Load a mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> MeshResult<MeshData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Reading mesh file {}", path.display());
    load_obj_from_reader(BufReader::new(file))
}

/// Load a mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> MeshResult<MeshData> {
    let parsed = parse_obj(reader)?;
    MeshData::from_parsed(parsed)
}

/// Convenience helper to parse mesh text held in memory.
pub fn load_obj_from_str(contents: &str) -> MeshResult<MeshData> {
    load_obj_from_reader(io::Cursor::new(contents))
}

/// Read every line, collecting positions and raw faces.
pub fn parse_obj<R: BufRead>(reader: R) -> MeshResult<ParsedObj> {
    let mut out = ParsedObj::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| MeshError::Read {
            line: line_no + 1,
            source,
        })?;

        match parse_record(&line) {
            Ok(Record::Position(p)) => out.positions.push(p),
            Ok(Record::Face(refs)) => {
                let seen = out.positions.len() as i64;
                let refs = refs
                    .into_iter()
                    .map(|raw| (raw, resolve_index(raw, seen)))
                    .collect();
                out.faces.push(RawFace {
                    line: line_no + 1,
                    refs,
                });
            }
            Ok(Record::Ignored) => {}
            Err(err) => {
                log::warn!("Skipping mesh line {}: {} ('{}')", line_no + 1, err, line.trim());
                out.skipped_lines += 1;
            }
        }
    }

    Ok(out)
}

/// Classify and parse a single line.
pub fn parse_record(line: &str) -> Result<Record, LineError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(Record::Ignored);
    }

    let mut parts = trimmed.split_whitespace();
    let Some(tag) = parts.next() else {
        return Ok(Record::Ignored);
    };

    match tag {
        "v" => {
            let values: Vec<&str> = parts.collect();
            // `v x y z [w]` and `v x y z r g b` carry the position first
            if values.len() < 3 {
                return Err(LineError::WrongTokenCount {
                    tag: "v",
                    expected: "at least 3",
                    found: values.len(),
                });
            }
            let mut p = [0.0f32; 3];
            for (slot, token) in p.iter_mut().zip(&values) {
                *slot = parse_f32(token)?;
            }
            Ok(Record::Position(p))
        }
        "f" => {
            let refs = parts.map(parse_face_ref).collect::<Result<Vec<_>, _>>()?;
            if refs.len() < 3 {
                return Err(LineError::WrongTokenCount {
                    tag: "f",
                    expected: "at least 3",
                    found: refs.len(),
                });
            }
            Ok(Record::Face(refs))
        }
        // vt/vn/o/g/s/usemtl/mtllib and anything unknown
        _ => Ok(Record::Ignored),
    }
}

fn parse_f32(token: &str) -> Result<f32, LineError> {
    match token.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LineError::BadNumber(token.to_string())),
    }
}

/// `7`, `7/2`, `7//3`, `7/2/3` all reference position 7.
fn parse_face_ref(token: &str) -> Result<i64, LineError> {
    let pos = token.split('/').next().unwrap_or(token);
    pos.parse::<i64>()
        .map_err(|_| LineError::BadNumber(token.to_string()))
}

/// 1-based → 0-based; negative values count back from the vertices seen so
/// far. Zero maps to -1, which never validates.
fn resolve_index(raw: i64, seen: i64) -> i64 {
    if raw > 0 { raw - 1 } else if raw < 0 { seen + raw } else { -1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = load_obj_from_str(src).expect("parse triangle");
        assert!(mesh.loaded());
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
    }

    #[test]
    fn records_are_classified() {
        assert_eq!(parse_record("v 1 2 3"), Ok(Record::Position([1.0, 2.0, 3.0])));
        assert_eq!(parse_record("f 1 2 3 4"), Ok(Record::Face(vec![1, 2, 3, 4])));
        assert_eq!(parse_record("f 1//1 -1//1 3/4"), Ok(Record::Face(vec![1, -1, 3])));
        assert_eq!(parse_record("   "), Ok(Record::Ignored));
        assert_eq!(parse_record("# comment"), Ok(Record::Ignored));
        assert_eq!(parse_record("vn 0 1 0"), Ok(Record::Ignored));
        assert_eq!(parse_record("usemtl shiny"), Ok(Record::Ignored));
    }

    #[test]
    fn malformed_records_are_reported() {
        assert!(matches!(
            parse_record("v 1 2"),
            Err(LineError::WrongTokenCount { tag: "v", found: 2, .. })
        ));
        assert!(matches!(
            parse_record("f 1 2"),
            Err(LineError::WrongTokenCount { tag: "f", found: 2, .. })
        ));
        assert_eq!(parse_record("v 1 x 3"), Err(LineError::BadNumber("x".into())));
        assert_eq!(parse_record("f 1 a 3"), Err(LineError::BadNumber("a".into())));
    }

    #[test]
    fn extra_vertex_components_are_ignored() {
        assert_eq!(parse_record("v 1 2 3 1.0"), Ok(Record::Position([1.0, 2.0, 3.0])));
        assert_eq!(
            parse_record("v 1 2 3 0.5 0.25 1.0"),
            Ok(Record::Position([1.0, 2.0, 3.0]))
        );

        let mesh = load_obj_from_str("v 0 0 0 1.0\nv 1 0 0 1.0\nv 0 1 0 1.0\nf 1 2 3\n").unwrap();
        assert!(mesh.loaded());
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.skipped_lines(), 0);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1\nv 0 1 0\nf 1 2\nf 1 2 3\nbogus line here\n";
        let parsed = parse_obj(io::Cursor::new(src)).unwrap();
        assert_eq!(parsed.positions.len(), 3);
        assert_eq!(parsed.faces.len(), 1);
        assert_eq!(parsed.skipped_lines, 2);

        let mesh = load_obj_from_str(src).unwrap();
        assert!(mesh.loaded());
        assert_eq!(mesh.skipped_lines(), 2);
    }

    #[test]
    fn indices_resolve_to_zero_based() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\nf 0 1 2\n";
        let parsed = parse_obj(io::Cursor::new(src)).unwrap();
        assert_eq!(parsed.faces[0].refs, vec![(-3, 0), (-2, 1), (-1, 2)]);
        assert_eq!(parsed.faces[1].refs, vec![(0, -1), (1, 0), (2, 1)]);
        assert_eq!(parsed.faces[1].line, 5);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_obj_from_path("definitely/not/here.obj").unwrap_err();
        assert!(matches!(err, MeshError::Io { .. }));
    }
}
