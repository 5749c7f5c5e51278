use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let total: i64 = match conn.query_row("SELECT COUNT(*) FROM participants", [], |r| r.get(0)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut by_day = serde_json::Map::new();
    for day in 1..=3 {
        let count: i64 = match conn.query_row(
            "SELECT COUNT(*) FROM checkins WHERE event_day = ?",
            [day],
            |r| r.get(0),
        ) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        by_day.insert(day.to_string(), json!(count));
    }

    let mut stmt = match conn.prepare(
        "SELECT stake, COUNT(*) AS total
         FROM participants
         GROUP BY stake
         ORDER BY stake ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let stakes = stmt
        .query_map([], |row| {
            Ok(json!({
                "stake": row.get::<_, String>(0)?,
                "total": row.get::<_, i64>(1)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let stakes = match stakes {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "total": total,
            "byDay": by_day,
            "stakes": stakes
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(handle_dashboard_summary(state, req)),
        _ => None,
    }
}
