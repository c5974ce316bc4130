//! Grid parameter storage backed by the HTTP session.

use async_trait::async_trait;
use datagrid::{GridError, GridResult, Storage};
use tower_sessions::Session;

/// [`Storage`] over the caller's session.
#[derive(Clone)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

fn storage_error(e: tower_sessions::session::Error) -> GridError {
    GridError::Storage(e.to_string())
}

#[async_trait]
impl Storage for SessionStorage {
    async fn read(&self, key: &str) -> GridResult<Option<String>> {
        self.session.get::<String>(key).await.map_err(storage_error)
    }

    async fn write(&self, key: &str, content: String) -> GridResult<()> {
        self.session.insert(key, content).await.map_err(storage_error)
    }

    async fn clear(&self, key: &str) -> GridResult<()> {
        self.session
            .remove::<String>(key)
            .await
            .map(|_| ())
            .map_err(storage_error)
    }
}
