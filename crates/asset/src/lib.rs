//! Asset loading/parsers (meshes, cube-map textures).
//! Mesh text is parsed into an indexed triangle list with smooth normals;
//! loading can run off the frame loop and be polled.

use std::{io, path::PathBuf};

use thiserror::Error;

pub mod loader;
pub mod mesh;
pub mod obj;
pub mod texture;

pub use loader::{MeshSlot, PendingMesh};
pub use mesh::{Aabb, Face, MeshData, MeshVertex, Vertex};

/// Fatal mesh loading errors. Malformed lines are not errors; they are
/// skipped and counted by the parser.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read mesh text at line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
    #[error("face on line {line} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        line: usize,
        index: i64,
        vertex_count: usize,
    },
    #[error("mesh contains no faces")]
    NoFaces,
    #[error("mesh has {0} vertices, more than 32-bit indices can address")]
    TooManyVertices(usize),
    #[error("a mesh load is already in progress")]
    LoadInProgress,
    #[error("failed to start mesh loader thread")]
    Spawn(#[source] io::Error),
    #[error("mesh loader thread panicked")]
    LoaderPanicked,
}

pub type MeshResult<T> = Result<T, MeshError>;
