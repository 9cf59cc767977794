use super::shutdown;
use crate::options::{FailedLoginsBlock, FailedLoginsPolicy};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Hash, Eq, PartialEq, Debug, Clone)]
struct LockKey {
    ip: Option<IpAddr>,
    username: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Failures {
    count: u32,
    last_at: Instant,
}

/// Whether a key may attempt to log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockState {
    /// This failure reached the threshold
    MaxFailuresReached,
    /// Earlier failures already reached the threshold
    AlreadyLocked,
}

/// Remembers recent login failures per IP, user or both, and locks out keys that fail too often.
#[derive(Debug)]
pub(crate) struct FailedLoginsCache {
    policy: FailedLoginsPolicy,
    failures: RwLock<HashMap<LockKey, Failures>>,
}

impl FailedLoginsCache {
    pub fn new(policy: FailedLoginsPolicy) -> Arc<FailedLoginsCache> {
        Arc::new(FailedLoginsCache {
            policy,
            failures: RwLock::new(HashMap::new()),
        })
    }

    fn key(&self, ip: IpAddr, username: &str) -> LockKey {
        let (ip, username) = match self.policy.block_by {
            FailedLoginsBlock::IP => (Some(ip), None),
            FailedLoginsBlock::User => (None, Some(username.to_string())),
            FailedLoginsBlock::UserAndIP => (Some(ip), Some(username.to_string())),
        };
        LockKey { ip, username }
    }

    fn expired(&self, failures: &Failures) -> bool {
        failures.last_at.elapsed() > self.policy.expires_after
    }

    /// Whether the key is locked out right now, without recording anything.
    pub async fn locked(&self, ip: IpAddr, username: &str) -> bool {
        let key = self.key(ip, username);
        match self.failures.read().await.get(&key) {
            Some(f) => !self.expired(f) && f.count >= self.policy.max_attempts,
            None => false,
        }
    }

    /// Records a failure. A run of failures older than the expiry starts over.
    pub async fn failed(&self, ip: IpAddr, username: &str) -> Option<LockState> {
        let key = self.key(ip, username);
        let mut failures = self.failures.write().await;
        let count = match failures.get_mut(&key) {
            Some(f) => {
                f.count = if self.expired(f) { 1 } else { f.count.saturating_add(1) };
                f.last_at = Instant::now();
                f.count
            }
            None => {
                failures.insert(key, Failures { count: 1, last_at: Instant::now() });
                1
            }
        };
        match count {
            c if c == self.policy.max_attempts => Some(LockState::MaxFailuresReached),
            c if c > self.policy.max_attempts => Some(LockState::AlreadyLocked),
            _ => None,
        }
    }

    /// Records a success: forgets earlier failures unless the key is still locked.
    pub async fn success(&self, ip: IpAddr, username: &str) -> Option<LockState> {
        let key = self.key(ip, username);
        let mut failures = self.failures.write().await;
        let locked = match failures.get(&key) {
            Some(f) => !self.expired(f) && f.count >= self.policy.max_attempts,
            None => return None,
        };
        if locked {
            Some(LockState::AlreadyLocked)
        } else {
            failures.remove(&key);
            None
        }
    }

    async fn sweep(&self, logger: &slog::Logger) {
        let mut failures = self.failures.write().await;
        let before = failures.len();
        failures.retain(|_, f| !self.expired(f));
        let swept = before - failures.len();
        if swept > 0 {
            slog::debug!(logger, "Swept {} expired failed login entries", swept);
        }
    }

    /// Removes expired entries every few seconds until the server shuts down.
    pub async fn sweeper(&self, logger: slog::Logger, shutdown: Arc<shutdown::Notifier>) {
        let mut listener = shutdown.subscribe().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => self.sweep(&logger).await,
                _ = listener.listen() => {
                    slog::debug!(logger, "Failed logins sweeper stopping");
                    return;
                }
            }
        }
    }
}
