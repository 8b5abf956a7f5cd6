use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{RepositoryConfig, TimetableConfig};
use crate::repository::{
    ReferenceSource, RepositoryError, ScheduleRepository, ScheduleRepositoryClient,
    SqliteScheduleRepository,
};

/// Shared state for the timetable server.
pub struct TimetableState {
    /// Where schedule records are persisted
    pub repository: Arc<dyn ScheduleRepository>,
    /// Registries used to check referenced ids; unset when the backend has none
    pub references: Option<Arc<dyn ReferenceSource>>,
    /// One lock per form session, so a form can only have one submission in flight
    form_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl TimetableState {
    pub fn new(
        repository: Arc<dyn ScheduleRepository>,
        references: Option<Arc<dyn ReferenceSource>>,
    ) -> Self {
        Self {
            repository,
            references,
            form_locks: DashMap::new(),
        }
    }

    /// Builds the repository described by `config`.
    pub fn from_config(config: &TimetableConfig) -> Result<Self, RepositoryError> {
        match &config.repository {
            RepositoryConfig::Sqlite { path } => {
                info!(path = %path, "Using SQLite schedule repository");
                let repository = if path == ":memory:" {
                    SqliteScheduleRepository::in_memory()?
                } else {
                    SqliteScheduleRepository::open(path)?
                };
                Ok(Self::new(Arc::new(repository), None))
            }
            RepositoryConfig::Http { base_url, .. } => {
                info!(base_url = %base_url, "Using HTTP schedule repository");
                let client_config =
                    config
                        .repository
                        .client_config()
                        .ok_or_else(|| RepositoryError::UrlError {
                            message: "missing HTTP repository settings".to_string(),
                        })?;
                let client = Arc::new(ScheduleRepositoryClient::with_config(client_config)?);
                Ok(Self::new(client.clone(), Some(client)))
            }
        }
    }

    /// Gets or creates the lock for the form session `key`.
    pub fn form_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.form_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forgets the lock for `key` once nobody else holds a handle to it.
    ///
    /// Callers must drop their own guard and handle first.
    pub fn release_form_lock(&self, key: &str) {
        self.form_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of form sessions that currently have a lock entry.
    pub fn form_session_count(&self) -> usize {
        self.form_locks.len()
    }
}
