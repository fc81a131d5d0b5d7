use std::path::PathBuf;

use serde::Deserialize;

use crate::controller::FormController;
use crate::db::SqliteStore;

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
    pub controller: Option<FormController<SqliteStore>>,
}
