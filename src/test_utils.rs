//! In-memory fakes for the database and secret-store seams.

use crate::db::{Connector, DbError, PgSource, ServerInfoRow};
use crate::secrets::{ConnectionConfig, SecretError, SecretStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn fake_error(name: &'static str, message: &str) -> DbError {
    DbError::Query {
        name,
        source: sqlx::Error::Protocol(message.to_string()),
    }
}

#[derive(Default)]
struct FakeState {
    settings: Vec<(String, String)>,
    server_info: Option<ServerInfoRow>,
    dir_entries: Option<Result<Vec<String>, String>>,
    files: HashMap<String, Result<String, String>>,
    scalars_i64: HashMap<&'static str, i64>,
    scalars_text: HashMap<&'static str, String>,
    read_paths: Vec<String>,
}

/// Fake database session. Clones share state, so a test can keep one handle
/// while a `FakeConnector` hands out another.
#[derive(Clone, Default)]
pub struct FakePgSource {
    state: Arc<Mutex<FakeState>>,
    closed: Arc<AtomicBool>,
}

impl FakePgSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .settings
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_server_info(self, version: &str, host: Option<&str>, database: &str) -> Self {
        self.state.lock().unwrap().server_info = Some(ServerInfoRow {
            version: version.to_string(),
            host: host.map(str::to_string),
            database: database.to_string(),
        });
        self
    }

    pub fn with_dir_entries(self, entries: &[&str]) -> Self {
        self.state.lock().unwrap().dir_entries =
            Some(Ok(entries.iter().map(|e| e.to_string()).collect()));
        self
    }

    pub fn with_dir_error(self, message: &str) -> Self {
        self.state.lock().unwrap().dir_entries = Some(Err(message.to_string()));
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), Ok(content.to_string()));
        self
    }

    pub fn with_unreadable_file(self, path: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_i64(self, sql: &'static str, value: i64) -> Self {
        self.state.lock().unwrap().scalars_i64.insert(sql, value);
        self
    }

    pub fn with_text(self, sql: &'static str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .scalars_text
            .insert(sql, value.to_string());
        self
    }

    /// Paths passed to `read_file`, in call order.
    pub fn read_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().read_paths.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PgSource for FakePgSource {
    async fn settings(&self, names: &[&str]) -> Result<Vec<(String, String)>, DbError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .settings
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .cloned()
            .collect())
    }

    async fn server_info(&self) -> Result<ServerInfoRow, DbError> {
        self.state
            .lock()
            .unwrap()
            .server_info
            .clone()
            .ok_or_else(|| fake_error("server_info", "no server info configured"))
    }

    async fn list_dir(&self, _dir: &str) -> Result<Vec<String>, DbError> {
        match self.state.lock().unwrap().dir_entries.clone() {
            Some(Ok(entries)) => Ok(entries),
            Some(Err(message)) => Err(fake_error("list_log_files", &message)),
            None => Ok(Vec::new()),
        }
    }

    async fn read_file(&self, path: &str) -> Result<String, DbError> {
        let mut state = self.state.lock().unwrap();
        state.read_paths.push(path.to_string());
        match state.files.get(path) {
            Some(Ok(content)) => Ok(content.clone()),
            Some(Err(message)) => Err(fake_error("read_log_file", message)),
            None => Err(fake_error("read_log_file", "no such file")),
        }
    }

    async fn fetch_i64(&self, sql: &'static str) -> Result<i64, DbError> {
        self.state
            .lock()
            .unwrap()
            .scalars_i64
            .get(sql)
            .copied()
            .ok_or_else(|| fake_error("fetch_i64", sql))
    }

    async fn fetch_text(&self, sql: &'static str) -> Result<String, DbError> {
        self.state
            .lock()
            .unwrap()
            .scalars_text
            .get(sql)
            .cloned()
            .ok_or_else(|| fake_error("fetch_text", sql))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out clones of one `FakePgSource` and counts connections.
#[derive(Clone, Default)]
pub struct FakeConnector {
    source: FakePgSource,
    fail_with: Option<String>,
    connects: Arc<AtomicU32>,
}

impl FakeConnector {
    pub fn new(source: FakePgSource) -> Self {
        Self {
            source,
            fail_with: None,
            connects: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn PgSource>, DbError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(DbError::Connect(sqlx::Error::Protocol(message.clone()))),
            None => Ok(Box::new(self.source.clone())),
        }
    }
}

/// Secret store holding fixed credentials per path.
#[derive(Clone, Default)]
pub struct FakeSecretStore {
    secrets: Arc<Mutex<HashMap<String, ConnectionConfig>>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, path: &str) -> Self {
        self.secrets.lock().unwrap().insert(
            path.to_string(),
            ConnectionConfig {
                host: "127.0.0.1".to_string(),
                port: "5432".to_string(),
                username: "monitor".to_string(),
                password: "secret".to_string(),
                database: "app".to_string(),
                ssl_mode: "disable".to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn connection_config(&self, path: &str) -> Result<ConnectionConfig, SecretError> {
        self.secrets
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(SecretError::MissingField("Host"))
    }
}
