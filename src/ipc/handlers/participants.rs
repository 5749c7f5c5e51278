use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;
use uuid::Uuid;

use super::attendance;

// Browse responses are capped so a huge roster cannot blow up the shell.
const LIST_CAP: i64 = 500;

fn opt_param(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn distinct_column(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    rows.collect()
}

fn day_set_json(conn: &Connection, day: i64) -> rusqlite::Result<serde_json::Value> {
    let mut ids: Vec<String> = attendance::checkin_day_set(conn, day)?.into_iter().collect();
    ids.sort();
    Ok(json!(ids))
}

fn handle_participants_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let q = opt_param(req, "q").map(|s| s.to_lowercase());
    let stake = opt_param(req, "stake");
    let ward = opt_param(req, "ward");

    let mut sql = String::from(
        "SELECT id, name, stake, ward_branch, email, phone_number, tshirt_size
         FROM participants WHERE 1=1",
    );
    let mut args: Vec<Value> = Vec::new();
    if let Some(q) = &q {
        sql.push_str(
            " AND (lower(name) LIKE ? OR lower(stake) LIKE ? OR lower(ward_branch) LIKE ?
               OR lower(coalesce(phone_number, '')) LIKE ?)",
        );
        let like = format!("%{}%", q);
        for _ in 0..4 {
            args.push(Value::Text(like.clone()));
        }
    }
    if let Some(stake) = &stake {
        sql.push_str(" AND stake = ?");
        args.push(Value::Text(stake.clone()));
    }
    if let Some(ward) = &ward {
        sql.push_str(" AND ward_branch = ?");
        args.push(Value::Text(ward.clone()));
    }
    sql.push_str(" ORDER BY name ASC LIMIT ?");
    args.push(Value::Integer(LIST_CAP));

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(args), |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "stake": row.get::<_, String>(2)?,
                "wardBranch": row.get::<_, String>(3)?,
                "email": row.get::<_, Option<String>>(4)?,
                "phoneNumber": row.get::<_, Option<String>>(5)?,
                "tshirtSize": row.get::<_, Option<String>>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let participants = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Membership sets cover every participant so the shell can render toggle
    // state even for rows outside the current filter.
    let checked_in = (|| -> rusqlite::Result<serde_json::Value> {
        Ok(json!({
            "day1": day_set_json(conn, 1)?,
            "day2": day_set_json(conn, 2)?,
            "day3": day_set_json(conn, 3)?
        }))
    })();
    let checked_in = match checked_in {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let stakes = distinct_column(conn, "SELECT DISTINCT stake FROM participants ORDER BY stake");
    let wards = distinct_column(
        conn,
        "SELECT DISTINCT ward_branch FROM participants ORDER BY ward_branch",
    );
    let (stakes, wards) = match (stakes, wards) {
        (Ok(s), Ok(w)) => (s, w),
        (Err(e), _) | (_, Err(e)) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let count = participants.len();
    ok(
        &req.id,
        json!({
            "participants": participants,
            "count": count,
            "stakes": stakes,
            "wards": wards,
            "checkedIn": checked_in
        }),
    )
}

fn handle_participants_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = opt_param(req, "name");
    let stake = opt_param(req, "stake");
    let ward_branch = opt_param(req, "wardBranch");
    let (Some(name), Some(stake), Some(ward_branch)) = (name, stake, ward_branch) else {
        return err(
            &req.id,
            "bad_params",
            "name, stake and wardBranch must be non-empty",
            None,
        );
    };
    let email = opt_param(req, "email");
    let phone_number = opt_param(req, "phoneNumber");
    let tshirt_size = opt_param(req, "tshirtSize");

    let participant_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO participants(id, name, stake, ward_branch, email, phone_number, tshirt_size)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &participant_id,
            &name,
            &stake,
            &ward_branch,
            &email,
            &phone_number,
            &tshirt_size,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "participants" })),
        );
    }

    ok(&req.id, json!({ "participantId": participant_id }))
}

fn handle_participants_filters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let stakes = match distinct_column(conn, "SELECT DISTINCT stake FROM participants ORDER BY stake")
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let wards = match opt_param(req, "stake") {
        Some(stake) => {
            let mut stmt = match conn.prepare(
                "SELECT DISTINCT ward_branch FROM participants WHERE stake = ? ORDER BY ward_branch",
            ) {
                Ok(s) => s,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            stmt.query_map([&stake], |r| r.get::<_, String>(0))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        }
        None => distinct_column(
            conn,
            "SELECT DISTINCT ward_branch FROM participants ORDER BY ward_branch",
        ),
    };
    let wards = match wards {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(&req.id, json!({ "stakes": stakes, "wards": wards }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "participants.list" => Some(handle_participants_list(state, req)),
        "participants.create" => Some(handle_participants_create(state, req)),
        "participants.filters" => Some(handle_participants_filters(state, req)),
        _ => None,
    }
}
