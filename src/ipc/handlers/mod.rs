pub mod attendance;
pub mod core;
pub mod dashboard;
pub mod export;
pub mod import_roster;
pub mod participants;
