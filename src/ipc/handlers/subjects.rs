use super::{param_str, require_session};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, CategoryInput};
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::list_subjects(conn, session) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let Some(raw_categories) = req.params.get("categories").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "categories must be an array", None);
    };
    let mut categories = Vec::with_capacity(raw_categories.len());
    for (i, raw) in raw_categories.iter().enumerate() {
        match CategoryInput::from_json(i, raw) {
            Ok(c) => categories.push(c),
            Err(e) => return store_err(&req.id, &e),
        }
    }

    match store::create_subject(conn, session, name, &categories) {
        Ok(subject) => {
            tracing::info!(subject_id = %subject.subject_id, categories = subject.categories.len(), "subject created");
            ok(&req.id, json!({ "subject": subject }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match param_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_subject(conn, session, subject_id) {
        Ok(removed_records) => ok(
            &req.id,
            json!({ "subjectId": subject_id, "removedRecords": removed_records }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
