//! Directory-backed [`DataStore`].
//!
//! Layout: `<root>/<mailbox>/<message>`. Each subdirectory of the root is a
//! mailbox and each regular file inside it is a message. The file's
//! modification time is the message date and its file name is the message id.
//! Entries whose names start with `.` are ignored. Mailboxes and messages are
//! listed in lexical order.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DataStore, Mailbox, Message, StoreError};

/// Mail store rooted at a filesystem directory.
#[derive(Debug, Clone)]
pub struct DirDataStore {
    root: PathBuf,
}

impl DirDataStore {
    /// Create a store rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a store rooted at `root`. The directory must already exist.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        tracing::debug!(root = %root.display(), "Opened directory mail store");
        Ok(Self::new(root))
    }
}

/// List visible entries of `dir` matching `want_dir`, sorted by file name.
async fn list_entries(dir: &Path, want_dir: bool) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::io(entry.path(), e))?;
        if (want_dir && file_type.is_dir()) || (!want_dir && file_type.is_file()) {
            entries.push((name, entry.path()));
        }
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

#[async_trait]
impl DataStore for DirDataStore {
    async fn all_mailboxes(&self) -> Result<Vec<Arc<dyn Mailbox>>, StoreError> {
        let entries = list_entries(&self.root, true).await?;
        Ok(entries
            .into_iter()
            .map(|(name, path)| Arc::new(DirMailbox { name, path }) as Arc<dyn Mailbox>)
            .collect())
    }
}

#[derive(Debug)]
struct DirMailbox {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl Mailbox for DirMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn messages(&self) -> Result<Vec<Arc<dyn Message>>, StoreError> {
        let entries = list_entries(&self.path, false).await?;
        load_messages(entries).await
    }
}

/// Stat each listed file into a message handle.
///
/// Files removed after the directory was listed are skipped.
async fn load_messages(
    entries: Vec<(String, PathBuf)>,
) -> Result<Vec<Arc<dyn Message>>, StoreError> {
    let mut messages: Vec<Arc<dyn Message>> = Vec::with_capacity(entries.len());
    for (id, path) in entries {
        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Message vanished while listing, skipping");
                continue;
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        messages.push(Arc::new(DirMessage {
            id,
            path,
            date: DateTime::<Utc>::from(modified),
        }));
    }

    Ok(messages)
}

#[derive(Debug)]
struct DirMessage {
    id: String,
    path: PathBuf,
    date: DateTime<Utc>,
}

#[async_trait]
impl Message for DirMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    async fn delete(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::MessageNotFound(self.id.clone()))
            }
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}
