use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

/// Event days are a fixed 1..=3; anything else is rejected before any write.
pub fn parse_event_day(params: &serde_json::Value) -> Result<i64, HandlerErr> {
    let day = params.get("day").and_then(|v| v.as_i64()).ok_or(HandlerErr {
        code: "bad_params",
        message: "missing day".to_string(),
        details: None,
    })?;
    if !(1..=3).contains(&day) {
        return Err(HandlerErr {
            code: "bad_params",
            message: "day must be 1, 2, or 3".to_string(),
            details: Some(json!({ "day": day })),
        });
    }
    Ok(day)
}

/// Ids of every participant with a check-in fact for the given day.
///
/// Spans the whole roster, not any filtered page, so toggle controls render
/// consistently everywhere.
pub fn checkin_day_set(conn: &Connection, day: i64) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT participant_id FROM checkins WHERE event_day = ?")?;
    let rows = stmt.query_map([day], |r| r.get::<_, String>(0))?;
    rows.collect()
}

fn toggle(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let participant_id = get_required_str(params, "participantId")?;
    let day = parse_event_day(params)?;

    // Take the write lock up front: a toggle decides based on what it reads,
    // so two of them for the same key must serialize, not interleave.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(|e| {
        HandlerErr {
            code: "db_tx_failed",
            message: e.to_string(),
            details: None,
        }
    })?;

    let exists = tx
        .query_row(
            "SELECT 1 FROM participants WHERE id = ?",
            [&participant_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?
        .is_some();
    if !exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "participant not found".to_string(),
            details: Some(json!({ "participantId": participant_id })),
        });
    }

    // Flip by deleting first; if nothing was there, insert. The unique
    // (participant_id, event_day) constraint absorbs a concurrent insert of
    // the same fact, so a suppressed conflict is not an error.
    let removed = tx
        .execute(
            "DELETE FROM checkins WHERE participant_id = ? AND event_day = ?",
            (&participant_id, day),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "checkins" })),
        })?;

    if removed == 0 {
        tx.execute(
            "INSERT INTO checkins(id, participant_id, event_day, timestamp)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(participant_id, event_day) DO NOTHING",
            (
                Uuid::new_v4().to_string(),
                &participant_id,
                day,
                Utc::now().to_rfc3339(),
            ),
        )
        .map_err(|e| HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "checkins" })),
        })?;
    }

    // Report what is actually stored, not what this call believes it did.
    let checked_in = tx
        .query_row(
            "SELECT 1 FROM checkins WHERE participant_id = ? AND event_day = ?",
            (&participant_id, day),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?
        .is_some();

    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({
        "participantId": participant_id,
        "day": day,
        "checkedIn": checked_in
    }))
}

fn handle_attendance_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match toggle(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.toggle" => Some(handle_attendance_toggle(state, req)),
        _ => None,
    }
}
