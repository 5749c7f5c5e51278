use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn summary_counts_roster_checkins_and_stakes() {
    let workspace = temp_dir("rosterd-dashboard");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let csv = "name,stake,ward\n\
               Ada Lovelace,Riverside,Maple 1st\n\
               Grace Hopper,Lakeview,Cedar Branch\n\
               Maria Santos,Riverside,Oak 2nd\n";
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.import",
        json!({ "text": csv }),
    );

    let list = request_ok(&mut stdin, &mut reader, "3", "participants.list", json!({}));
    let ids: Vec<String> = list
        .get("participants")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|p| p.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string())
        .collect();
    assert_eq!(ids.len(), 3);

    // Two check-ins on day 1, one on day 3.
    for (rid, pid, day) in [("4", &ids[0], 1), ("5", &ids[1], 1), ("6", &ids[1], 3)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            rid,
            "attendance.toggle",
            json!({ "participantId": pid, "day": day }),
        );
    }

    let dash = request_ok(&mut stdin, &mut reader, "7", "dashboard.summary", json!({}));
    assert_eq!(dash.get("total").and_then(|v| v.as_i64()), Some(3));
    let by_day = dash.get("byDay").expect("byDay");
    assert_eq!(by_day.get("1").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(by_day.get("2").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(by_day.get("3").and_then(|v| v.as_i64()), Some(1));

    let stakes = dash.get("stakes").and_then(|v| v.as_array()).expect("stakes");
    assert_eq!(stakes.len(), 2);
    assert_eq!(
        stakes[0].get("stake").and_then(|v| v.as_str()),
        Some("Lakeview")
    );
    assert_eq!(stakes[0].get("total").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(
        stakes[1].get("stake").and_then(|v| v.as_str()),
        Some("Riverside")
    );
    assert_eq!(stakes[1].get("total").and_then(|v| v.as_i64()), Some(2));

    let _ = std::fs::remove_dir_all(workspace);
}
