//! CPU-side mesh representation produced by the loaders.
//!
//! Polygons are fan-triangulated and every triangle's (area-weighted) face
//! normal is summed into its three vertices; the sums are normalized once
//! all faces are in, which gives smooth per-vertex shading without
//! duplicating vertices per face.

use std::io;

use glam::Vec3;

use crate::{MeshError, MeshResult, obj};

/// Source vertex: position plus the running normal sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Number of triangles that contributed to `normal`.
    pub count: u32,
}

impl Vertex {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    fn accumulate(&mut self, n: Vec3) {
        self.normal = (Vec3::from(self.normal) + n).to_array();
        self.count += 1;
    }

    /// Zero-length sums (unreferenced or only degenerate triangles) stay zero.
    fn normalize(&mut self) {
        let n = Vec3::from(self.normal);
        if n.length() > 0.0 {
            self.normal = n.normalize().to_array();
        }
    }
}

/// Polygon as an ordered list of 0-based vertex indices (at least three).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    /// Fan triangulation around the first vertex: N-2 triangles.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let pivot = self.indices.first().copied().unwrap_or_default();
        self.indices
            .windows(2)
            .skip(1)
            .map(move |pair| [pivot, pair[0], pair[1]])
    }
}

/// Vertex as handed to the GPU. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            for axis in 0..3 {
                bb.min[axis] = bb.min[axis].min(p[axis]);
                bb.max[axis] = bb.max[axis].max(p[axis]);
            }
        }
        Some(bb)
    }

    pub fn center(&self) -> [f32; 3] {
        ((Vec3::from(self.min) + Vec3::from(self.max)) * 0.5).to_array()
    }

    pub fn extent(&self) -> [f32; 3] {
        (Vec3::from(self.max) - Vec3::from(self.min)).to_array()
    }

    /// Half of the box diagonal.
    pub fn radius(&self) -> f32 {
        0.5 * Vec3::from(self.extent()).length()
    }

    /// `(scale, translation)` such that `scale * (p + translation)` centres
    /// the box at the origin with its largest half-extent equal to
    /// `half_size`. Flat or point-sized boxes keep a scale of 1.
    pub fn canonical(&self, half_size: f32) -> (f32, [f32; 3]) {
        let e = self.extent();
        let largest = 0.5 * e[0].max(e[1]).max(e[2]);
        let s = if largest > f32::EPSILON {
            half_size / largest
        } else {
            1.0
        };
        (s, (-Vec3::from(self.center())).to_array())
    }
}

/// Indexed triangle mesh with smooth per-vertex normals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    render_vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    bounds: Option<Aabb>,
    skipped_lines: usize,
    loaded: bool,
}

impl MeshData {
    /// Empty, not yet loaded mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse mesh text in place. On a fatal error `self` is left untouched,
    /// so a fresh mesh stays unloaded.
    pub fn load_from_text(&mut self, text: &str) -> MeshResult<()> {
        let parsed = obj::parse_obj(io::Cursor::new(text))?;
        *self = Self::from_parsed(parsed)?;
        log::info!(
            "Mesh loaded: {} vertices, {} faces, {} triangles ({} lines skipped)",
            self.vertex_count(),
            self.face_count(),
            self.triangle_count(),
            self.skipped_lines
        );
        Ok(())
    }

    /// Blocking file load; see [`crate::loader`] for the non-blocking path.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        obj::load_obj_from_path(path)
    }

    pub(crate) fn from_parsed(parsed: obj::ParsedObj) -> MeshResult<Self> {
        let vertex_count = parsed.positions.len();
        if u32::try_from(vertex_count).is_err() {
            return Err(MeshError::TooManyVertices(vertex_count));
        }

        let faces = parsed
            .faces
            .iter()
            .map(|raw| {
                raw.refs
                    .iter()
                    .map(|&(written, resolved)| {
                        if resolved < 0 || resolved as usize >= vertex_count {
                            Err(MeshError::IndexOutOfRange {
                                line: raw.line,
                                index: written,
                                vertex_count,
                            })
                        } else {
                            Ok(resolved as u32)
                        }
                    })
                    .collect::<MeshResult<Vec<u32>>>()
                    .map(Face::new)
            })
            .collect::<MeshResult<Vec<Face>>>()?;

        Self::build(parsed.positions, faces, parsed.skipped_lines)
    }

    /// Build from already 0-based polygons. Polygons with fewer than three
    /// indices are dropped.
    pub fn from_polygons(positions: Vec<[f32; 3]>, polygons: Vec<Vec<u32>>) -> MeshResult<Self> {
        let vertex_count = positions.len();
        if u32::try_from(vertex_count).is_err() {
            return Err(MeshError::TooManyVertices(vertex_count));
        }

        let mut skipped = 0;
        let mut faces = Vec::with_capacity(polygons.len());
        for (n, poly) in polygons.into_iter().enumerate() {
            if poly.len() < 3 {
                log::warn!("Dropping polygon {} with {} indices", n + 1, poly.len());
                skipped += 1;
                continue;
            }
            if let Some(&bad) = poly.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    line: n + 1,
                    index: i64::from(bad) + 1,
                    vertex_count,
                });
            }
            faces.push(Face::new(poly));
        }

        Self::build(positions, faces, skipped)
    }

    fn build(positions: Vec<[f32; 3]>, faces: Vec<Face>, skipped_lines: usize) -> MeshResult<Self> {
        if faces.is_empty() {
            return Err(MeshError::NoFaces);
        }

        let bounds = Aabb::from_points(&positions);
        let mut vertices: Vec<Vertex> = positions.into_iter().map(Vertex::at).collect();
        let mut indices = Vec::new();

        for face in &faces {
            for tri in face.triangles() {
                let [a, b, c] = tri.map(|i| Vec3::from(vertices[i as usize].position));
                let n = (b - a).cross(c - a);
                for i in tri {
                    vertices[i as usize].accumulate(n);
                }
                indices.extend_from_slice(&tri);
            }
        }

        for v in &mut vertices {
            v.normalize();
        }

        let render_vertices = vertices
            .iter()
            .map(|v| MeshVertex::new(v.position, v.normal))
            .collect();

        Ok(Self {
            vertices,
            faces,
            render_vertices,
            indices,
            bounds,
            skipped_lines,
            loaded: true,
        })
    }

    /// Axis-aligned cube of the given half size, outward winding. Used as
    /// the skybox geometry.
    pub fn cube(half: f32) -> MeshResult<Self> {
        let h = half;
        let positions = vec![
            // back z=-h
            [-h, -h, -h], // 0
            [h, -h, -h],  // 1
            [h, h, -h],   // 2
            [-h, h, -h],  // 3
            // front z=+h
            [-h, -h, h], // 4
            [h, -h, h],  // 5
            [h, h, h],   // 6
            [-h, h, h],  // 7
        ];
        let quads = vec![
            vec![4, 5, 6, 7], // +Z
            vec![0, 3, 2, 1], // -Z
            vec![3, 7, 6, 2], // +Y
            vec![0, 1, 5, 4], // -Y
            vec![0, 4, 7, 3], // -X
            vec![1, 2, 6, 5], // +X
        ];
        Self::from_polygons(positions, quads)
    }

    /// True only after a load completed without a fatal error.
    #[inline]
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Flattened position/normal buffer, one entry per source vertex.
    pub fn render_vertices(&self) -> &[MeshVertex] {
        &self.render_vertices
    }

    /// Triangle list indices into [`Self::render_vertices`].
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// See [`Aabb::canonical`]. `None` for a mesh without vertices.
    pub fn canonical_transform(&self, half_size: f32) -> Option<(f32, [f32; 3])> {
        self.bounds.map(|bb| bb.canonical(half_size))
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn new_mesh_is_not_loaded() {
        let mesh = MeshData::new();
        assert!(!mesh.loaded());
        assert!(mesh.indices().is_empty());
        assert_eq!(mesh.bounds(), None);
    }

    #[test]
    fn minimal_triangle_loads() {
        let mut mesh = MeshData::new();
        mesh.load_from_text(TRIANGLE).unwrap();
        assert!(mesh.loaded());
        assert_eq!(mesh.triangle_count(), 1);
        for v in mesh.render_vertices() {
            assert_close(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn out_of_range_index_leaves_mesh_unloaded() {
        let mut mesh = MeshData::new();
        let err = mesh
            .load_from_text("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n")
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange { line: 4, index: 4, vertex_count: 3 }
        ));
        assert!(!mesh.loaded());
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn face_without_vertices_is_fatal() {
        let mut mesh = MeshData::new();
        let err = mesh.load_from_text("f 1 2 3\n").unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { vertex_count: 0, .. }));
        assert!(!mesh.loaded());
    }

    #[test]
    fn zero_index_is_out_of_range() {
        let mut mesh = MeshData::new();
        let err = mesh.load_from_text("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { index: 0, .. }));
    }

    #[test]
    fn text_without_faces_fails() {
        let mut mesh = MeshData::new();
        let err = mesh.load_from_text("# only a comment\nv 0 0 0\n").unwrap_err();
        assert!(matches!(err, MeshError::NoFaces));
        assert!(!mesh.loaded());
    }

    #[test]
    fn fan_triangulation_shares_first_vertex() {
        let face = Face::new(vec![7, 3, 9, 4, 1, 5]);
        let tris: Vec<_> = face.triangles().collect();
        assert_eq!(tris.len(), 4);
        assert!(tris.iter().all(|t| t[0] == 7));
        assert_eq!(tris[0], [7, 3, 9]);
        assert_eq!(tris[3], [7, 1, 5]);
    }

    #[test]
    fn polygon_face_yields_n_minus_two_triangles() {
        let src = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n";
        let mesh = crate::obj::load_obj_from_str(src).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.triangle_count(), 3);
        assert!(mesh.indices().chunks(3).all(|t| t[0] == 0));
    }

    #[test]
    fn normals_are_unit_or_zero_when_unreferenced() {
        // vertex 5 is never used by a face
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 1\nv 9 9 9\nf 1 2 3\nf 1 3 4\nf 2 4 3\n";
        let mesh = crate::obj::load_obj_from_str(src).unwrap();
        for v in mesh.vertices() {
            let len = Vec3::from(v.normal).length();
            if v.count == 0 {
                assert_eq!(v.normal, [0.0, 0.0, 0.0]);
            } else {
                assert!((len - 1.0).abs() < 1e-5, "normal length {len}");
            }
        }
        assert_eq!(mesh.vertices()[4].count, 0);
    }

    #[test]
    fn shared_vertex_normal_averages_incident_faces() {
        // Two faces of a right-angle fold sharing the edge 1-2.
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 2 3\nf 1 4 2\n";
        let mesh = crate::obj::load_obj_from_str(src).unwrap();
        let s = std::f32::consts::FRAC_1_SQRT_2;
        assert_close(mesh.render_vertices()[0].normal, [0.0, s, s]);
        assert_close(mesh.render_vertices()[1].normal, [0.0, s, s]);
        assert_close(mesh.render_vertices()[2].normal, [0.0, 0.0, 1.0]);
        assert_close(mesh.render_vertices()[3].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn cube_has_outward_corner_normals() {
        let cube = MeshData::cube(2.0).unwrap();
        assert!(cube.loaded());
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.triangle_count(), 12);
        let inv = 1.0 / 3f32.sqrt();
        assert_close(cube.render_vertices()[6].normal, [inv, inv, inv]);
        assert_close(cube.render_vertices()[0].normal, [-inv, -inv, -inv]);
    }

    #[test]
    fn bounds_and_canonical_transform() {
        let src = "v 1 1 1\nv 5 1 1\nv 1 3 1\nv 1 1 2\nf 1 2 3\nf 1 3 4\n";
        let mesh = crate::obj::load_obj_from_str(src).unwrap();
        let bb = mesh.bounds().unwrap();
        assert_eq!(bb.min, [1.0, 1.0, 1.0]);
        assert_eq!(bb.max, [5.0, 3.0, 2.0]);
        assert_close(bb.center(), [3.0, 2.0, 1.5]);
        let (s, t) = bb.canonical(1.0);
        assert!((s - 0.5).abs() < 1e-6);
        assert_close(t, [-3.0, -2.0, -1.5]);
        assert_eq!(mesh.canonical_transform(1.0), Some((s, t)));
        assert_eq!(MeshData::new().canonical_transform(1.0), None);
    }

    #[test]
    fn degenerate_bounds_keep_unit_scale() {
        let bb = Aabb::from_points(&[[2.0, 2.0, 2.0]]).unwrap();
        assert_eq!(bb.canonical(4.0).0, 1.0);
        assert_eq!(bb.radius(), 0.0);
    }

    #[test]
    fn polygons_with_bad_index_fail() {
        let err = MeshData::from_polygons(vec![[0.0; 3]; 3], vec![vec![0, 1, 3]]).unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { line: 1, index: 4, .. }));
    }
}
