//! Mutual exclusion around index provisioning.
//!
//! Dropping and recreating an index is destructive. Two orchestrators that
//! start at the same time against the same index name could interleave
//! their create/delete calls, so [`IndexManager`](crate::IndexManager) holds
//! a [`ProvisionLock`] for the whole check-and-migrate sequence.
//!
//! - [`InProcessLock`] serialises provisioning inside one process.
//! - [`LockFile`] serialises provisioning across processes on one host
//!   through an advisory lock file.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RagError, Result};

/// Held for the duration of a provisioning critical section. Releases the
/// lock on drop.
#[must_use = "the provisioning lock is released as soon as the guard is dropped"]
pub struct ProvisionGuard {
    _inner: GuardInner,
}

#[allow(dead_code)]
enum GuardInner {
    InProcess(OwnedMutexGuard<()>),
    File(LockFileGuard),
}

/// A lock keyed by index name.
#[async_trait]
pub trait ProvisionLock: Send + Sync {
    /// Block until the lock for `index` is held.
    async fn acquire(&self, index: &str) -> Result<ProvisionGuard>;
}

/// Per-index-name async mutexes shared by everything in this process.
#[derive(Debug, Default)]
pub struct InProcessLock {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

static GLOBAL_LOCK: LazyLock<Arc<InProcessLock>> =
    LazyLock::new(|| Arc::new(InProcessLock::default()));

impl InProcessLock {
    /// Create an independent lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide lock table used by default.
    pub fn global() -> Arc<InProcessLock> {
        Arc::clone(&GLOBAL_LOCK)
    }
}

#[async_trait]
impl ProvisionLock for InProcessLock {
    async fn acquire(&self, index: &str) -> Result<ProvisionGuard> {
        let mutex = self.locks.lock().await.entry(index.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        Ok(ProvisionGuard { _inner: GuardInner::InProcess(guard) })
    }
}

/// Advisory lock files in a shared directory, one per index name.
///
/// The lock file is created with `create_new`, so exactly one process wins,
/// and it holds a random owner token. While the guard lives a heartbeat task
/// refreshes the file's modification time every quarter of `stale_after`.
/// Others poll until the file disappears or `timeout` elapses. A lock file
/// whose heartbeat stopped for longer than `stale_after` belongs to a crashed
/// process and is removed by whichever waiter first takes the short-lived
/// `.reclaim` file next to it.
#[derive(Debug, Clone)]
pub struct LockFile {
    dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    stale_after: Duration,
}

impl LockFile {
    /// Lock files are created under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(250),
            stale_after: Duration::from_secs(60),
        }
    }

    /// How long to wait for another holder before giving up.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How often to re-check a held lock.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Time without a heartbeat after which a lock file is considered
    /// abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Path of the lock file for `index`.
    pub fn path_for(&self, index: &str) -> PathBuf {
        let sanitized: String = index
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.provision.lock"))
    }

    async fn is_stale(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.stale_after)
    }

    /// Remove `path` if it is still stale once the reclaim file is held.
    /// Returns whether the lock file was removed.
    async fn reclaim_stale(&self, index: &str, path: &Path) -> bool {
        let mut reclaim = path.as_os_str().to_owned();
        reclaim.push(".reclaim");
        let reclaim = PathBuf::from(reclaim);

        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&reclaim).await {
            Ok(_) => {
                let removed = self.is_stale(path).await && tokio::fs::remove_file(path).await.is_ok();
                if removed {
                    warn!(index, path = %path.display(), "removed stale provisioning lock file");
                }
                if let Err(e) = tokio::fs::remove_file(&reclaim).await {
                    warn!(path = %reclaim.display(), error = %e, "failed to remove reclaim file");
                }
                removed
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.is_stale(&reclaim).await {
                    warn!(index, path = %reclaim.display(), "removing abandoned reclaim file");
                    let _ = tokio::fs::remove_file(&reclaim).await;
                }
                false
            }
            Err(e) => {
                debug!(index, path = %reclaim.display(), error = %e, "could not create reclaim file");
                false
            }
        }
    }

    async fn create(&self, index: &str, path: &Path) -> std::io::Result<LockFileGuard> {
        let mut file = tokio::fs::OpenOptions::new().write(true).create_new(true).open(path).await?;
        let token = Uuid::new_v4().to_string();
        let written = async {
            file.write_all(token.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(path).await;
            return Err(e);
        }
        debug!(index, path = %path.display(), "acquired provisioning lock file");

        let period = (self.stale_after / 4).max(Duration::from_millis(1));
        let heartbeat = tokio::spawn(heartbeat(path.to_path_buf(), token.clone(), period));
        Ok(LockFileGuard { path: path.to_path_buf(), token, heartbeat })
    }
}

#[async_trait]
impl ProvisionLock for LockFile {
    async fn acquire(&self, index: &str) -> Result<ProvisionGuard> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| RagError::IndexProvisionError {
            index: index.to_string(),
            message: format!("failed to create lock directory {}: {e}", self.dir.display()),
        })?;
        let path = self.path_for(index);
        let started = Instant::now();
        loop {
            match self.create(index, &path).await {
                Ok(guard) => return Ok(ProvisionGuard { _inner: GuardInner::File(guard) }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.is_stale(&path).await && self.reclaim_stale(index, &path).await {
                        continue;
                    }
                    if started.elapsed() >= self.timeout {
                        return Err(RagError::IndexProvisionError {
                            index: index.to_string(),
                            message: format!(
                                "timed out after {:?} waiting for lock file {}",
                                self.timeout,
                                path.display()
                            ),
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    return Err(RagError::IndexProvisionError {
                        index: index.to_string(),
                        message: format!("failed to create lock file {}: {e}", path.display()),
                    });
                }
            }
        }
    }
}

/// Keep the lock file fresh until it is gone or owned by someone else.
async fn heartbeat(path: PathBuf, token: String, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let (path, token) = (path.clone(), token.clone());
        match tokio::task::spawn_blocking(move || touch_if_owned(&path, &token)).await {
            Ok(Ok(true)) => {}
            _ => break,
        }
    }
}

/// Refresh the modification time of `path` if it still holds `token`. Never
/// creates the file.
fn touch_if_owned(path: &Path, token: &str) -> std::io::Result<bool> {
    let mut file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    if contents != token {
        return Ok(false);
    }
    file.set_modified(SystemTime::now())?;
    Ok(true)
}

fn is_owned_by(path: &Path, token: &str) -> bool {
    std::fs::read_to_string(path).is_ok_and(|contents| contents == token)
}

struct LockFileGuard {
    path: PathBuf,
    token: String,
    heartbeat: JoinHandle<()>,
}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
        if !is_owned_by(&self.path, &self.token) {
            warn!(path = %self.path.display(), "provisioning lock file is no longer ours; leaving it");
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove provisioning lock file");
        }
    }
}
