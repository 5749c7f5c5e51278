use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::tabular;
use rusqlite::Connection;
use serde_json::json;
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

enum Mode {
    Append,
    Replace,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Append => "append",
            Mode::Replace => "replace",
        }
    }
}

fn parse_mode(params: &serde_json::Value) -> Result<Mode, HandlerErr> {
    match params
        .get("mode")
        .and_then(|v| v.as_str())
        .unwrap_or("append")
        .to_ascii_lowercase()
        .as_str()
    {
        "append" => Ok(Mode::Append),
        "replace" => Ok(Mode::Replace),
        other => Err(HandlerErr {
            code: "bad_params",
            message: "mode must be append or replace".to_string(),
            details: Some(json!({ "mode": other })),
        }),
    }
}

/// Picks the field delimiter from the file name. Anything that is not
/// tabular text is refused outright; the shell converts spreadsheets to
/// CSV before handing them over.
fn delimiter_for(filename: &str) -> Result<char, HandlerErr> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        Ok(',')
    } else if lower.ends_with(".tsv") {
        Ok('\t')
    } else {
        Err(HandlerErr {
            code: "unsupported_format",
            message: "unsupported file type: expected .csv or .tsv".to_string(),
            details: Some(json!({ "filename": filename })),
        })
    }
}

/// Upload input is either a file the daemon reads itself (`inPath`) or text
/// the shell already holds (`text`, with an optional `filename` for dialect
/// detection; bare text is treated as CSV).
fn read_upload_input(params: &serde_json::Value) -> Result<(String, char), HandlerErr> {
    if let Some(in_path) = params
        .get("inPath")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        let delim = delimiter_for(&in_path)?;
        let text = std::fs::read_to_string(&in_path).map_err(|e| HandlerErr {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": in_path })),
        })?;
        return Ok((text, delim));
    }

    if let Some(text) = params.get("text").and_then(|v| v.as_str()) {
        let delim = match params.get("filename").and_then(|v| v.as_str()) {
            Some(name) => delimiter_for(name)?,
            None => ',',
        };
        return Ok((text.to_string(), delim));
    }

    Err(HandlerErr {
        code: "bad_params",
        message: "missing inPath or text".to_string(),
        details: None,
    })
}

fn missing_fields(row: &tabular::RosterRow) -> Vec<&'static str> {
    let mut out = Vec::new();
    if row.name.is_empty() {
        out.push("name");
    }
    if row.stake.is_empty() {
        out.push("stake");
    }
    if row.ward_branch.is_empty() {
        out.push("ward_branch");
    }
    out
}

fn import(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mode = parse_mode(params)?;
    let (text, delim) = read_upload_input(params)?;

    let table = tabular::parse_delimited(&text, delim).map_err(|e| HandlerErr {
        code: "unsupported_format",
        message: format!("could not parse upload: {}", e),
        details: None,
    })?;
    let rows = tabular::normalize_rows(&table);

    // The whole batch is one transaction: a replace that fails half-way must
    // not leave the roster gutted, and a bad insert must not keep earlier
    // rows of the same file.
    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;

    if matches!(mode, Mode::Replace) {
        for sql in ["DELETE FROM checkins", "DELETE FROM participants"] {
            tx.execute(sql, []).map_err(|e| HandlerErr {
                code: "db_update_failed",
                message: e.to_string(),
                details: None,
            })?;
        }
    }

    let mut inserted = 0usize;
    let mut skipped: Vec<serde_json::Value> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        if !row.has_required() {
            skipped.push(json!({
                "row": idx + 1,
                "reason": format!("missing {}", missing_fields(row).join(", "))
            }));
            continue;
        }
        tx.execute(
            "INSERT INTO participants(id, name, stake, ward_branch, email, phone_number, tshirt_size)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &row.name,
                &row.stake,
                &row.ward_branch,
                &row.email,
                &row.phone_number,
                &row.tshirt_size,
            ),
        )
        .map_err(|e| HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "participants", "row": idx + 1 })),
        })?;
        inserted += 1;
    }

    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    tracing::info!(inserted, skipped = skipped.len(), mode = mode.as_str(), "roster import");

    Ok(json!({
        "inserted": inserted,
        "skipped": skipped,
        "total": rows.len(),
        "mode": mode.as_str()
    }))
}

fn handle_roster_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match import(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.import" => Some(handle_roster_import(state, req)),
        _ => None,
    }
}
