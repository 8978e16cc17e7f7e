use super::{param_str, require_session};
use crate::entry;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::settings;
use crate::store::{self, RecordPatch, StoreError};
use serde_json::json;

fn allow_extra_credit(conn: &rusqlite::Connection, req: &Request) -> Result<bool, serde_json::Value> {
    settings::grading(conn)
        .map(|g| g.allow_extra_credit)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let category_id = match param_str(req, "categoryId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::list_records(conn, session, category_id) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let category_id = match param_str(req, "categoryId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let parsed = entry::parse_text("name", req.params.get("name")).and_then(|name| {
        let item_max = entry::parse_item_max("item", req.params.get("item"))?;
        let score = entry::parse_score("score", req.params.get("score"))?;
        Ok((name, item_max, score))
    });
    let (name, item_max, score) = match parsed {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &StoreError::from(e)),
    };
    let extra = match allow_extra_credit(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match store::add_record(conn, session, category_id, &name, item_max, score, extra) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record_id = match param_str(req, "recordId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw_patch) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch = match RecordPatch::from_json(raw_patch) {
        Ok(p) => p,
        Err(e) => return store_err(&req.id, &e),
    };
    let extra = match allow_extra_credit(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match store::update_record(conn, session, record_id, &patch, extra) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match require_session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record_id = match param_str(req, "recordId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_record(conn, session, record_id) {
        Ok(()) => ok(&req.id, json!({ "recordId": record_id })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.add" => Some(handle_records_add(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        _ => None,
    }
}
