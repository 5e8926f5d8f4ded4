//! Non-blocking mesh loading.
//!
//! A load runs on its own thread and parks its outcome in a shared cell;
//! the frame loop polls the cell once per tick and never waits on it.

use std::{
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;

use crate::{MeshError, MeshResult, mesh::MeshData, obj};

type Outcome = MeshResult<MeshData>;

/// Promise-like handle for a mesh being loaded in the background.
pub struct PendingMesh {
    cell: Arc<Mutex<Option<Outcome>>>,
    worker: Option<JoinHandle<()>>,
    source: String,
}

impl PendingMesh {
    /// Start reading and parsing `path` in the background.
    pub fn spawn(path: impl Into<PathBuf>) -> MeshResult<Self> {
        let path = path.into();
        let source = path.display().to_string();
        Self::start(source, move || obj::load_obj_from_path(&path))
    }

    /// Parse already fetched text in the background.
    pub fn from_text(text: String) -> MeshResult<Self> {
        Self::start("<memory>".to_string(), move || {
            let mut mesh = MeshData::new();
            mesh.load_from_text(&text).map(|_| mesh)
        })
    }

    fn start(source: String, job: impl FnOnce() -> Outcome + Send + 'static) -> MeshResult<Self> {
        let cell = Arc::new(Mutex::new(None));
        let shared = Arc::clone(&cell);
        let worker = thread::Builder::new()
            .name("mesh-loader".into())
            .spawn(move || {
                let outcome = job();
                *shared.lock() = Some(outcome);
            })
            .map_err(MeshError::Spawn)?;

        log::info!("Mesh load started: {source}");
        Ok(Self {
            cell,
            worker: Some(worker),
            source,
        })
    }

    /// `None` while the load is still running. Yields the outcome once.
    pub fn poll(&mut self) -> Option<Outcome> {
        if let Some(outcome) = self.take() {
            return Some(outcome);
        }

        let finished = self.worker.as_ref().is_some_and(JoinHandle::is_finished);
        if !finished {
            return None;
        }

        // The worker may have stored its outcome between the two checks.
        if let Some(outcome) = self.take() {
            return Some(outcome);
        }
        self.worker = None;
        log::error!("Mesh loader for {} exited without a result", self.source);
        Some(Err(MeshError::LoaderPanicked))
    }

    fn take(&mut self) -> Option<Outcome> {
        let outcome = self.cell.lock().take()?;
        if let Some(worker) = self.worker.take() {
            // Already past its last statement; joining does not block.
            let _ = worker.join();
        }
        Some(outcome)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// The viewer's single mesh: starts unloaded, is filled by one background
/// load. Starting another load while one is pending is rejected.
#[derive(Default)]
pub struct MeshSlot {
    mesh: MeshData,
    pending: Option<PendingMesh>,
}

impl MeshSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, path: impl Into<PathBuf>) -> MeshResult<()> {
        self.ensure_idle()?;
        self.pending = Some(PendingMesh::spawn(path)?);
        Ok(())
    }

    pub fn request_text(&mut self, text: String) -> MeshResult<()> {
        self.ensure_idle()?;
        self.pending = Some(PendingMesh::from_text(text)?);
        Ok(())
    }

    fn ensure_idle(&self) -> MeshResult<()> {
        if self.pending.is_some() {
            return Err(MeshError::LoadInProgress);
        }
        Ok(())
    }

    /// Check the pending load without blocking. Returns `Some` exactly once
    /// per request, when it completes; on success the mesh is swapped in.
    pub fn poll(&mut self) -> Option<MeshResult<()>> {
        let outcome = self.pending.as_mut()?.poll()?;
        self.pending = None;
        Some(outcome.map(|mesh| {
            self.mesh = mesh;
        }))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    fn wait(slot: &mut MeshSlot) -> MeshResult<()> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(outcome) = slot.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "mesh load did not finish");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn slot_starts_unloaded_and_fills_in() {
        let mut slot = MeshSlot::new();
        assert!(!slot.mesh().loaded());
        assert!(slot.poll().is_none());

        slot.request_text(QUAD.to_string()).unwrap();
        assert!(slot.is_pending());
        wait(&mut slot).unwrap();

        assert!(!slot.is_pending());
        assert!(slot.mesh().loaded());
        assert_eq!(slot.mesh().triangle_count(), 2);
        assert!(slot.poll().is_none());
    }

    #[test]
    fn second_request_while_pending_is_rejected() {
        let mut slot = MeshSlot::new();
        slot.request_text(QUAD.to_string()).unwrap();
        let err = slot.request_text(QUAD.to_string()).unwrap_err();
        assert!(matches!(err, MeshError::LoadInProgress));
        wait(&mut slot).unwrap();
    }

    #[test]
    fn failed_load_keeps_mesh_unloaded() {
        let mut slot = MeshSlot::new();
        slot.request_text("v 0 0 0\nf 1 2 3\n".to_string()).unwrap();
        let err = wait(&mut slot).unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { .. }));
        assert!(!slot.mesh().loaded());
        assert!(!slot.is_pending());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("asset-loader-{}.obj", std::process::id()));
        std::fs::write(&path, QUAD).unwrap();

        let mut slot = MeshSlot::new();
        slot.request(&path).unwrap();
        let outcome = wait(&mut slot);
        let _ = std::fs::remove_file(&path);

        outcome.unwrap();
        assert_eq!(slot.mesh().vertex_count(), 4);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let mut slot = MeshSlot::new();
        slot.request("no/such/mesh.obj").unwrap();
        assert!(matches!(wait(&mut slot), Err(MeshError::Io { .. })));
    }
}
