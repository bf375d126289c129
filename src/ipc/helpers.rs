use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::prioritize::parse_instant;
use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn now_ts() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Reads the optional `now` param; absent means the system clock. Methods
/// that score or bucket by time accept an injected instant so callers (and
/// tests) get deterministic results.
pub fn resolve_now(req: &Request) -> Result<NaiveDateTime, serde_json::Value> {
    match req.params.get("now") {
        None => Ok(Local::now().naive_local()),
        Some(v) if v.is_null() => Ok(Local::now().naive_local()),
        Some(v) => {
            let raw = v
                .as_str()
                .ok_or_else(|| err(&req.id, "bad_params", "now must be string or null", None))?;
            parse_instant(raw)
                .ok_or_else(|| err(&req.id, "bad_params", format!("unparseable now: {}", raw), None))
        }
    }
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

/// Validates an ISO date or date-time string and returns it trimmed.
/// Stored timestamps always round-trip through this at the boundary so the
/// pure core never sees an unparseable value from our own rows.
pub fn parse_opt_instant_str(v: Option<&JsonValue>) -> Result<Option<String>, String> {
    let raw = parse_opt_string(v).map_err(|m| m.to_string())?;
    match raw {
        None => Ok(None),
        Some(s) => {
            if parse_instant(&s).is_none() {
                return Err(format!("unparseable timestamp: {}", s));
            }
            Ok(Some(s))
        }
    }
}
