use std::path::{Path, PathBuf};

use serde::Deserialize;

use chrono::NaiveDate;

use crate::store::{DemoStore, SqliteStore, Store, StoreMode};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn Store>>,
}

impl AppState {
    pub fn mode(&self) -> Option<StoreMode> {
        self.store.as_ref().map(|s| s.mode())
    }

    pub fn is_demo(&self) -> bool {
        self.mode() == Some(StoreMode::Demo)
    }

    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        // Release the previous connection before opening another workspace.
        self.store = None;
        self.workspace = None;
        let store = SqliteStore::open(path)?;
        tracing::info!(workspace = %path.display(), revision = store.revision(), "workspace opened");
        self.workspace = Some(path.to_path_buf());
        self.store = Some(Box::new(store));
        Ok(())
    }

    pub fn start_demo(&mut self, today: NaiveDate, seeded: bool) {
        let store = if seeded {
            DemoStore::seeded(today)
        } else {
            DemoStore::empty()
        };
        tracing::info!(%today, seeded, "demo mode started");
        self.workspace = None;
        self.store = Some(Box::new(store));
    }

    pub fn close(&mut self) {
        self.store = None;
        self.workspace = None;
    }
}
