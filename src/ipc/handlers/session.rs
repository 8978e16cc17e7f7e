use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::Session;
use serde_json::json;

fn session_json(session: &Session) -> serde_json::Value {
    json!({
        "uid": session.uid,
        "displayName": session.display_name,
        "greetingName": session.greeting_name()
    })
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let uid = match req.params.get("uid").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing uid", None),
    };
    let display_name = match req.params.get("displayName") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "displayName must be string or null",
                    None,
                )
            }
        },
    };

    let session = Session { uid, display_name };
    tracing::info!(uid = %session.uid, "signed in");
    let result = session_json(&session);
    state.session = Some(session);
    ok(&req.id, result)
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(&req.id, json!({ "session": session_json(s) })),
        None => ok(&req.id, json!({ "session": null })),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_signed_in = state.session.take().is_some();
    if was_signed_in {
        tracing::info!("signed out");
    }
    ok(&req.id, json!({ "signedOut": was_signed_in }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(handle_sign_in(state, req)),
        "session.current" => Some(handle_current(state, req)),
        "session.signOut" => Some(handle_sign_out(state, req)),
        _ => None,
    }
}
