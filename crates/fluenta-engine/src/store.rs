//! Session persistence.
//!
//! The engine commits a full snapshot after every transition; a save
//! failure aborts the transition entirely, so stores must be atomic per
//! call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use fluenta_core::error::EngineError;

use crate::session::Session;

/// Atomic read-modify-write storage for session snapshots.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), EngineError>;
    async fn load(&self, id: Uuid) -> Result<Option<Session>, EngineError>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), EngineError> {
        self.sessions
            .lock()
            .map_err(|_| EngineError::Persistence("store lock poisoned".into()))?
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Session>, EngineError> {
        Ok(self
            .sessions
            .lock()
            .map_err(|_| EngineError::Persistence("store lock poisoned".into()))?
            .get(&id)
            .cloned())
    }
}

/// One JSON file per session under a directory. Writes go through a
/// temp file and rename so a crash never leaves a torn snapshot.
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: PathBuf) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::Persistence(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save(&self, session: &Session) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| EngineError::Persistence(format!("serialize session: {e}")))?;
        let path = self.path_for(session.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| EngineError::Persistence(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| EngineError::Persistence(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Session>, EngineError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Persistence(format!("read {}: {e}", path.display())))?;
        let session: Session = serde_json::from_str(&content)
            .map_err(|e| EngineError::Persistence(format!("parse {}: {e}", path.display())))?;
        Ok(Some(session))
    }
}
