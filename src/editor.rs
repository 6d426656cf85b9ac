//! Backend state of the embedded sheet view.
//!
//! The sheet view shows the dataset as an editable grid. Building a grid is
//! memoized per browser session; the scheduler drops the whole memo once per
//! cooldown window so stale sessions do not pile up.

use crate::dataset::Dataset;
use crate::error::CacheClearError;
use crate::scheduler::BackendCache;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Grid rendition of the dataset handed to the sheet view
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl GridSnapshot {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let columns: Vec<String> = dataset.columns().iter().map(|c| c.name.clone()).collect();
        let rows = (0..dataset.row_count())
            .map(|r| {
                dataset
                    .columns()
                    .iter()
                    .map(|c| c.values[r].to_string())
                    .collect()
            })
            .collect();
        GridSnapshot { columns, rows }
    }
}

/// Per-session memo of grid snapshots
#[derive(Debug, Default)]
pub struct EditorBackend {
    sessions: Mutex<HashMap<String, Arc<GridSnapshot>>>,
    builds: AtomicUsize,
}

impl EditorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for `session`, built from `dataset` on first request
    pub fn snapshot(&self, session: &str, dataset: &Dataset) -> Arc<GridSnapshot> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(snapshot) = sessions.get(session) {
            return Arc::clone(snapshot);
        }

        let snapshot = Arc::new(GridSnapshot::from_dataset(dataset));
        self.builds.fetch_add(1, Ordering::SeqCst);
        sessions.insert(session.to_string(), Arc::clone(&snapshot));
        debug!("built sheet snapshot for session {}", session);
        snapshot
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Number of snapshots built since creation
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl BackendCache for EditorBackend {
    fn clear(&self) -> Result<(), CacheClearError> {
        let mut sessions = self.sessions.lock().map_err(|_| CacheClearError::Backend {
            reason: "sheet session memo lock poisoned".to_string(),
        })?;
        let dropped = sessions.len();
        sessions.clear();
        debug!("dropped {} sheet sessions", dropped);
        Ok(())
    }
}
