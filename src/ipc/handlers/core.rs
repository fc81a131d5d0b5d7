use crate::config;
use crate::controller::FormController;
use crate::db;
use crate::gateway::PersistenceGateway;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(store) => {
            let settings = config::load_settings(&path);
            info!(
                workspace = %path.display(),
                atomic_writes = settings.atomic_writes,
                "workspace opened"
            );
            let settings_json = json!(settings);
            state.workspace = Some(path.clone());
            state.controller = Some(FormController::new(PersistenceGateway::new(
                store, settings,
            )));
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "settings": settings_json,
                }),
            )
        }
        Err(e) => {
            error!(workspace = %path.display(), error = %format!("{e:#}"), "failed to open workspace");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
