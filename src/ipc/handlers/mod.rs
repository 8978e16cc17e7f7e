pub mod core;
pub mod grades;
pub mod records;
pub mod session;
pub mod setup;
pub mod subjects;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::Session;
use rusqlite::Connection;

/// Open workspace connection plus the signed-in user, or the error response
/// to send back.
fn require_session<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, &'a Session), serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let Some(session) = state.session.as_ref() else {
        return Err(err(&req.id, "not_signed_in", "sign in first", None));
    };
    Ok((conn, session))
}

fn param_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}
