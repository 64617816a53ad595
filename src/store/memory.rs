//! In-memory [`DataStore`] implementation.
//!
//! Keeps mailboxes in insertion order and records every enumeration and
//! delete attempt so callers can observe how the store was used. Failures can
//! be injected with [`MemoryFailureMode`] to exercise error paths.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DataStore, Mailbox, Message, StoreError};

/// Failure to inject into a [`MemoryDataStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MemoryFailureMode {
    /// Normal operation.
    #[default]
    None,
    /// `all_mailboxes` fails.
    ListMailboxes,
    /// `messages` fails for the named mailbox.
    ListMessages { mailbox: String },
    /// `delete` fails for the given message ids.
    Delete { message_ids: Vec<String> },
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MailboxEntry {
    name: String,
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Default)]
struct Inner {
    mailboxes: RwLock<Vec<MailboxEntry>>,
    failure_mode: RwLock<MemoryFailureMode>,
    mailbox_list_calls: AtomicUsize,
    visited: Mutex<Vec<String>>,
    delete_attempts: Mutex<HashMap<String, usize>>,
}

impl Inner {
    fn failure_mode(&self) -> MemoryFailureMode {
        self.failure_mode.read().expect("RwLock poisoned").clone()
    }
}

/// Mail store held entirely in process memory.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataStore {
    inner: Arc<Inner>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_mode(failure_mode: MemoryFailureMode) -> Self {
        let store = Self::new();
        store.set_failure_mode(failure_mode);
        store
    }

    /// Replace the injected failure. Takes effect on the next store call.
    pub fn set_failure_mode(&self, failure_mode: MemoryFailureMode) {
        *self.inner.failure_mode.write().expect("RwLock poisoned") = failure_mode;
    }

    /// Create an empty mailbox if it does not already exist.
    pub fn add_mailbox(&self, name: impl Into<String>) {
        let name = name.into();
        let mut mailboxes = self.inner.mailboxes.write().expect("RwLock poisoned");
        if !mailboxes.iter().any(|m| m.name == name) {
            mailboxes.push(MailboxEntry {
                name,
                messages: Vec::new(),
            });
        }
    }

    /// Store a message, creating its mailbox on first use.
    pub fn add_message(
        &self,
        mailbox: impl Into<String>,
        id: impl Into<String>,
        date: DateTime<Utc>,
    ) {
        let mailbox = mailbox.into();
        self.add_mailbox(mailbox.clone());

        let mut mailboxes = self.inner.mailboxes.write().expect("RwLock poisoned");
        if let Some(entry) = mailboxes.iter_mut().find(|m| m.name == mailbox) {
            entry.messages.push(StoredMessage {
                id: id.into(),
                date,
            });
        }
    }

    /// Ids of the messages currently held by a mailbox, in storage order.
    pub fn message_ids(&self, mailbox: &str) -> Vec<String> {
        let mailboxes = self.inner.mailboxes.read().expect("RwLock poisoned");
        mailboxes
            .iter()
            .find(|m| m.name == mailbox)
            .map(|m| m.messages.iter().map(|msg| msg.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Total number of messages across all mailboxes.
    pub fn message_count(&self) -> usize {
        let mailboxes = self.inner.mailboxes.read().expect("RwLock poisoned");
        mailboxes.iter().map(|m| m.messages.len()).sum()
    }

    /// Number of times `all_mailboxes` has been called.
    pub fn mailbox_list_calls(&self) -> usize {
        self.inner.mailbox_list_calls.load(Ordering::Relaxed)
    }

    /// Mailbox names whose messages were listed, in call order.
    pub fn visited_mailboxes(&self) -> Vec<String> {
        self.inner.visited.lock().expect("Mutex poisoned").clone()
    }

    /// Number of delete attempts made against a message id.
    pub fn delete_attempts(&self, message_id: &str) -> usize {
        self.inner
            .delete_attempts
            .lock()
            .expect("Mutex poisoned")
            .get(message_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn all_mailboxes(&self) -> Result<Vec<Arc<dyn Mailbox>>, StoreError> {
        self.inner.mailbox_list_calls.fetch_add(1, Ordering::Relaxed);

        if self.inner.failure_mode() == MemoryFailureMode::ListMailboxes {
            return Err(StoreError::Unavailable(
                "simulated mailbox listing failure".to_string(),
            ));
        }

        let mailboxes = self.inner.mailboxes.read().expect("RwLock poisoned");
        Ok(mailboxes
            .iter()
            .map(|m| {
                Arc::new(MemoryMailbox {
                    inner: Arc::clone(&self.inner),
                    name: m.name.clone(),
                }) as Arc<dyn Mailbox>
            })
            .collect())
    }
}

/// Mailbox handle returned by [`MemoryDataStore`].
#[derive(Debug)]
pub struct MemoryMailbox {
    inner: Arc<Inner>,
    name: String,
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn messages(&self) -> Result<Vec<Arc<dyn Message>>, StoreError> {
        self.inner
            .visited
            .lock()
            .expect("Mutex poisoned")
            .push(self.name.clone());

        if let MemoryFailureMode::ListMessages { mailbox } = self.inner.failure_mode()
            && mailbox == self.name
        {
            return Err(StoreError::Unavailable(format!(
                "simulated message listing failure for {}",
                self.name
            )));
        }

        let mailboxes = self.inner.mailboxes.read().expect("RwLock poisoned");
        let entry = mailboxes
            .iter()
            .find(|m| m.name == self.name)
            .ok_or_else(|| StoreError::MailboxNotFound(self.name.clone()))?;

        Ok(entry
            .messages
            .iter()
            .map(|msg| {
                Arc::new(MemoryMessage {
                    inner: Arc::clone(&self.inner),
                    mailbox: self.name.clone(),
                    id: msg.id.clone(),
                    date: msg.date,
                }) as Arc<dyn Message>
            })
            .collect())
    }
}

/// Message handle returned by [`MemoryMailbox`].
#[derive(Debug)]
pub struct MemoryMessage {
    inner: Arc<Inner>,
    mailbox: String,
    id: String,
    date: DateTime<Utc>,
}

#[async_trait]
impl Message for MemoryMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    async fn delete(&self) -> Result<(), StoreError> {
        *self
            .inner
            .delete_attempts
            .lock()
            .expect("Mutex poisoned")
            .entry(self.id.clone())
            .or_default() += 1;

        if let MemoryFailureMode::Delete { message_ids } = self.inner.failure_mode()
            && message_ids.contains(&self.id)
        {
            return Err(StoreError::Unavailable(format!(
                "simulated delete failure for {}",
                self.id
            )));
        }

        let mut mailboxes = self.inner.mailboxes.write().expect("RwLock poisoned");
        let entry = mailboxes
            .iter_mut()
            .find(|m| m.name == self.mailbox)
            .ok_or_else(|| StoreError::MailboxNotFound(self.mailbox.clone()))?;

        let before = entry.messages.len();
        entry.messages.retain(|msg| msg.id != self.id);
        if entry.messages.len() == before {
            return Err(StoreError::MessageNotFound(self.id.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn test_mailboxes_keep_insertion_order() {
        let store = MemoryDataStore::new();
        store.add_mailbox("zeta");
        store.add_message("alpha", "a1", Utc::now());
        store.add_mailbox("zeta");

        let names: Vec<String> = store
            .all_mailboxes()
            .await
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(store.mailbox_list_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_message() {
        let store = MemoryDataStore::new();
        let date = Utc::now() - Duration::days(3);
        store.add_message("inbox", "m1", date);
        store.add_message("inbox", "m2", date);

        let mailboxes = store.all_mailboxes().await.unwrap();
        let messages = mailboxes[0].messages().await.unwrap();
        assert_eq!(messages[0].date(), date);

        messages[0].delete().await.unwrap();
        assert_eq!(store.message_ids("inbox"), vec!["m2"]);
        assert_eq!(store.delete_attempts("m1"), 1);

        // Second delete of the same handle reports the message as gone
        let err = messages[0].delete().await.unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(id) if id == "m1"));
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let store = MemoryDataStore::with_failure_mode(MemoryFailureMode::ListMailboxes);
        store.add_message("inbox", "m1", Utc::now());
        assert!(store.all_mailboxes().await.is_err());

        store.set_failure_mode(MemoryFailureMode::ListMessages {
            mailbox: "inbox".to_string(),
        });
        let mailboxes = store.all_mailboxes().await.unwrap();
        assert!(mailboxes[0].messages().await.is_err());
        assert_eq!(store.visited_mailboxes(), vec!["inbox"]);

        store.set_failure_mode(MemoryFailureMode::Delete {
            message_ids: vec!["m1".to_string()],
        });
        let messages = mailboxes[0].messages().await.unwrap();
        assert!(messages[0].delete().await.is_err());
        assert_eq!(store.message_count(), 1);
    }
}
