use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of the wire protocol: `{"id": ..., "method": ..., "params": {...}}`.
/// `params` defaults to JSON null so parameterless calls can omit it.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Mutable per-process state: which workspace is selected and its open
/// database handle. Both are None until `workspace.select` succeeds.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
