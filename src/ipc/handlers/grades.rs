use crate::controller::FormFields;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::render::View;
use serde_json::json;

fn handle_grades_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(controller) = state.controller.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let fields: FormFields = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    // Rejected and failed submissions are user-facing outcomes, not protocol errors.
    let outcome = controller.submit(&fields);
    let table = (controller.view() == View::Listing).then(|| json!(controller.table()));
    ok(
        &req.id,
        json!({
            "saved": outcome.is_saved(),
            "grade": outcome.saved,
            "rejected": outcome.rejected,
            "notifications": outcome.notifications,
            "form": controller.form(),
            "table": table,
        }),
    )
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(controller) = state.controller.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let rendered = controller.reload();
    ok(
        &req.id,
        json!({
            "view": controller.view(),
            "rendered": rendered,
            "table": controller.table(),
        }),
    )
}

fn handle_view_navigate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(controller) = state.controller.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let view: View = match req.params.get("view").cloned() {
        Some(v) => match serde_json::from_value(v) {
            Ok(view) => view,
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "view must be \"entry\" or \"listing\"",
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "missing view", None),
    };

    let rendered = controller.navigate(view);
    ok(
        &req.id,
        json!({
            "view": view,
            "rendered": rendered,
            "table": rendered.then(|| json!(controller.table())),
        }),
    )
}

fn handle_form_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(controller) = state.controller.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    ok(&req.id, json!({ "form": controller.form() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.submit" => Some(handle_grades_submit(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "view.navigate" => Some(handle_view_navigate(state, req)),
        "form.get" => Some(handle_form_get(state, req)),
        _ => None,
    }
}
