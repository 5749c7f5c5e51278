mod db;
mod ipc;
mod tabular;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    // .env is optional; real environment variables win over file entries.
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout is reserved for the IPC channel.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    // Optional default workspace so a shell can start the daemon ready to serve.
    if let Ok(path) = std::env::var("ROSTERD_WORKSPACE") {
        let path = PathBuf::from(path);
        match db::open_db(&path) {
            Ok(conn) => {
                tracing::info!(workspace = %path.display(), "workspace selected from environment");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => {
                tracing::warn!(workspace = %path.display(), error = %e, "failed to open workspace from environment");
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
