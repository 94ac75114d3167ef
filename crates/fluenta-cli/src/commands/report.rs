//! The `fluenta report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use fluenta_core::scale::ScaleConfig;
use fluenta_engine::store::{JsonFileSessionStore, SessionStore};
use fluenta_report::{render_certificate, SessionReport};

pub async fn execute(sessions_dir: PathBuf, session: String, format: String) -> Result<()> {
    let session_id: Uuid = session
        .parse()
        .with_context(|| format!("invalid session id: {session}"))?;

    let store = JsonFileSessionStore::new(sessions_dir)?;
    let snapshot = store
        .load(session_id)
        .await?
        .with_context(|| format!("no persisted session {session_id}"))?;

    let report = SessionReport::from_session(&snapshot, &ScaleConfig::default());

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => println!("{}", render_certificate(&report)),
        other => anyhow::bail!("unknown format: {other} (expected text or json)"),
    }

    Ok(())
}
