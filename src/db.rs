use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("roster.sqlite3");
    let conn = Connection::open(db_path)?;
    // Cascading deletes from participants to checkins rely on this pragma.
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // Several daemons may share one workspace; wait out writer contention
    // instead of failing a toggle with SQLITE_BUSY.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participants(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            stake TEXT NOT NULL,
            ward_branch TEXT NOT NULL,
            email TEXT,
            phone_number TEXT,
            tshirt_size TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_name ON participants(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_stake ON participants(stake)",
        [],
    )?;

    // A row's existence is the one witness of "checked in"; the unique pair
    // constraint is what resolves concurrent toggles for the same key.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkins(
            id TEXT PRIMARY KEY,
            participant_id TEXT NOT NULL,
            event_day INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            FOREIGN KEY(participant_id) REFERENCES participants(id) ON DELETE CASCADE,
            UNIQUE(participant_id, event_day)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checkins_participant ON checkins(participant_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checkins_day ON checkins(event_day)",
        [],
    )?;

    Ok(conn)
}
