//! Mail store contract consumed by the retention scanner.
//!
//! The scanner never owns mail data. It asks a [`DataStore`] for the current
//! mailboxes, asks each [`Mailbox`] for its messages, and calls
//! [`Message::delete`] on the ones that have expired. Handles are held only
//! for the duration of a single pass.
//!
//! Two adapters ship with the crate:
//!
//! - [`MemoryDataStore`]: in-process store, used for embedding and tests.
//!   Supports injected failures via [`MemoryFailureMode`].
//! - [`DirDataStore`]: one directory per mailbox, one file per message, with
//!   the file modification time as the message date.

mod dir;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use dir::DirDataStore;
pub use memory::{MemoryDataStore, MemoryFailureMode, MemoryMailbox, MemoryMessage};

/// Errors surfaced by a [`DataStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Persistent store of mailboxes.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// List every mailbox in the store, in the store's own order.
    async fn all_mailboxes(&self) -> Result<Vec<Arc<dyn Mailbox>>, StoreError>;
}

/// A named inbox within a [`DataStore`].
#[async_trait]
pub trait Mailbox: Send + Sync {
    fn name(&self) -> &str;

    /// List the messages currently held by this mailbox.
    async fn messages(&self) -> Result<Vec<Arc<dyn Message>>, StoreError>;
}

/// A single stored message.
#[async_trait]
pub trait Message: Send + Sync {
    /// Identifier, used for diagnostics only.
    fn id(&self) -> &str;

    /// Time the message was received.
    fn date(&self) -> DateTime<Utc>;

    /// Remove the message from its mailbox.
    async fn delete(&self) -> Result<(), StoreError>;
}
