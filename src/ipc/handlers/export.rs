use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::tabular::csv_quote;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;

use super::attendance;

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

/// Optional single-day selection. Accepts a JSON number or a numeric string;
/// anything outside 1..=3 is rejected before any work happens.
fn parse_day_filter(params: &serde_json::Value) -> Result<Option<i64>, HandlerErr> {
    let Some(v) = params.get("day") else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let day = v
        .as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()));
    match day {
        Some(d) if (1..=3).contains(&d) => Ok(Some(d)),
        _ => Err(HandlerErr {
            code: "bad_params",
            message: "day must be 1, 2, or 3".to_string(),
            details: Some(json!({ "day": v.clone() })),
        }),
    }
}

struct ExportRow {
    id: String,
    name: String,
    stake: String,
    ward_branch: String,
    email: Option<String>,
    phone_number: Option<String>,
    tshirt_size: Option<String>,
}

fn mark(set: &HashSet<String>, id: &str) -> &'static str {
    if set.contains(id) {
        "1"
    } else {
        "0"
    }
}

fn export_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let only_day = parse_day_filter(params)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name, stake, ward_branch, email, phone_number, tshirt_size
             FROM participants
             ORDER BY name ASC",
        )
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ExportRow {
                id: r.get(0)?,
                name: r.get(1)?,
                stake: r.get(2)?,
                ward_branch: r.get(3)?,
                email: r.get(4)?,
                phone_number: r.get(5)?,
                tshirt_size: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;

    let day_set = |day: i64| -> Result<HashSet<String>, HandlerErr> {
        attendance::checkin_day_set(conn, day).map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })
    };

    let mut csv = String::from("id,name,stake,ward_branch,email,phone_number,tshirt_size");
    match only_day {
        Some(d) => csv.push_str(&format!(",day{}\n", d)),
        None => csv.push_str(",day1,day2,day3\n"),
    }

    let sets: Vec<(i64, HashSet<String>)> = match only_day {
        Some(d) => vec![(d, day_set(d)?)],
        None => {
            let mut out = Vec::new();
            for d in 1..=3 {
                out.push((d, day_set(d)?));
            }
            out
        }
    };

    let rows_exported = rows.len();
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}",
            csv_quote(&row.id),
            csv_quote(&row.name),
            csv_quote(&row.stake),
            csv_quote(&row.ward_branch),
            csv_quote(row.email.as_deref().unwrap_or("")),
            csv_quote(row.phone_number.as_deref().unwrap_or("")),
            csv_quote(row.tshirt_size.as_deref().unwrap_or("")),
        ));
        for (_, set) in &sets {
            csv.push(',');
            csv.push_str(mark(set, &row.id));
        }
        csv.push('\n');
    }

    let filename = match only_day {
        Some(d) => format!("participants_day{}.csv", d),
        None => "participants.csv".to_string(),
    };

    // With an outPath the daemon delivers the file itself; otherwise the CSV
    // text goes back inline and the shell owns download/delivery.
    if let Some(out_path) = params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        let out = PathBuf::from(&out_path);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HandlerErr {
                code: "io_failed",
                message: e.to_string(),
                details: Some(json!({ "path": out_path.clone() })),
            })?;
        }
        std::fs::write(&out, &csv).map_err(|e| HandlerErr {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": out_path.clone() })),
        })?;
        return Ok(json!({
            "path": out_path,
            "filename": filename,
            "rowsExported": rows_exported
        }));
    }

    Ok(json!({
        "csv": csv,
        "filename": filename,
        "rowsExported": rows_exported
    }))
}

fn handle_roster_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match export_csv(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.exportCsv" => Some(handle_roster_export_csv(state, req)),
        _ => None,
    }
}
