//! In-memory presence store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::store::PresenceStore;

/// Process-local presence store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryPresenceStore {
    users: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemoryPresenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn add(&self, username: &str) -> Result<()> {
        self.ensure_open()?;
        self.users.lock().push(username.to_owned());
        Ok(())
    }

    async fn remove(&self, username: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut users = self.users.lock();
        match users.iter().position(|u| u == username) {
            Some(idx) => {
                let _ = users.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.users.lock().clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
