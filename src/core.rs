// src/core.rs
//! Service lifecycle for the secure-session core.
//!
//! [`SecurityCore`] builds every service from a [`CoreConfig`] and owns the
//! background sweeper that drops expired CSRF tokens, sessions and pending
//! key exchanges. The sweeper holds only weak references, so it never keeps
//! the stores alive, and it stops on shutdown before `shutdown` returns.

use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::auth::{
    Argon2Hasher, AuthManager, CredentialHasher, CredentialStore, CsrfToken, CsrfTokenService,
    MemoryCredentialStore, Session, SessionStore, SignedCookieCodec,
};
use crate::config::CoreConfig;
use crate::crypto::{KeyExchangeService, PendingExchange};
use crate::store::MemoryStore;
use crate::types::{CoreError, Result};
use crate::utils::{Clock, SystemClock};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Built, sweeper not running
    Created,
    /// Sweeper running
    Running,
    /// Stop signalled, waiting for the sweeper
    ShuttingDown,
    /// Sweeper finished
    Stopped,
}

/// Rows removed by one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub csrf_tokens: usize,
    pub sessions: usize,
    pub exchanges: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.csrf_tokens + self.sessions + self.exchanges
    }
}

fn sweep(csrf: &CsrfTokenService, sessions: &SessionStore, exchanges: &KeyExchangeService) -> SweepReport {
    SweepReport {
        csrf_tokens: csrf.sweep_expired(),
        sessions: sessions.sweep_expired(),
        exchanges: exchanges.cleanup_expired(),
    }
}

/// Owner of all secure-session services
pub struct SecurityCore {
    config: CoreConfig,
    exchanges: Arc<KeyExchangeService>,
    sessions: Arc<SessionStore>,
    csrf: Arc<CsrfTokenService>,
    auth: Arc<AuthManager>,
    state: Arc<RwLock<ServiceState>>,
    shutdown_tx: watch::Sender<bool>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SecurityCore {
    /// Build with the system clock, an in-memory user table and Argon2id
    pub fn new(config: CoreConfig) -> Result<Self> {
        let hasher = Argon2Hasher::new()?;
        Self::with_parts(
            config,
            Arc::new(SystemClock),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(hasher),
        )
    }

    /// Build with explicit collaborators
    pub fn with_parts(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        users: Arc<dyn CredentialStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self> {
        config.validate()?;

        let exchanges = Arc::new(KeyExchangeService::new(
            Arc::new(MemoryStore::<PendingExchange>::new("key_exchanges")),
            clock.clone(),
            config.exchange_ttl,
            config.max_pending_exchanges,
        ));
        let csrf = Arc::new(CsrfTokenService::new(
            Arc::new(MemoryStore::<CsrfToken>::new("csrf_tokens")),
            clock.clone(),
            config.csrf_ttl,
        ));
        let sessions = Arc::new(SessionStore::new(
            Arc::new(MemoryStore::<Session>::new("sessions")),
            csrf.clone(),
            clock,
            config.session_duration,
        ));
        let auth = Arc::new(AuthManager::new(
            exchanges.clone(),
            sessions.clone(),
            csrf.clone(),
            SignedCookieCodec::new(&config.cookie_secret)?,
            users,
            hasher,
            config.allow_plaintext_credentials,
        ));

        let (shutdown_tx, _) = watch::channel(false);

        info!("Secure-session core initialized");
        Ok(Self {
            config,
            exchanges,
            sessions,
            csrf,
            auth,
            state: Arc::new(RwLock::new(ServiceState::Created)),
            shutdown_tx,
            task_handles: Mutex::new(Vec::new()),
        })
    }

    /// Start the background sweeper
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != ServiceState::Created && *state != ServiceState::Stopped {
                return Err(CoreError::Internal(format!("Cannot start in state {:?}", *state)));
            }
            *state = ServiceState::Running;
        }

        self.shutdown_tx.send_replace(false);
        let handle = self.spawn_sweeper();
        self.task_handles.lock().await.push(handle);

        info!("Sweeper started (interval {:?})", self.config.sweep_interval);
        Ok(())
    }

    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let csrf: Weak<CsrfTokenService> = Arc::downgrade(&self.csrf);
        let sessions: Weak<SessionStore> = Arc::downgrade(&self.sessions);
        let exchanges: Weak<KeyExchangeService> = Arc::downgrade(&self.exchanges);
        let period = self.config.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let report = match (csrf.upgrade(), sessions.upgrade(), exchanges.upgrade()) {
                            (Some(c), Some(s), Some(e)) => sweep(&c, &s, &e),
                            _ => {
                                debug!("Stores dropped, sweeper exiting");
                                break;
                            }
                        };
                        if report.total() > 0 {
                            info!(
                                "Sweep removed {} CSRF tokens, {} sessions, {} key exchanges",
                                report.csrf_tokens, report.sessions, report.exchanges
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("Sweeper received shutdown signal");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Run one sweep immediately
    pub fn sweep_once(&self) -> SweepReport {
        sweep(&self.csrf, &self.sessions, &self.exchanges)
    }

    /// Stop the sweeper and wait for it; repeated calls are no-ops
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                ServiceState::ShuttingDown | ServiceState::Stopped => return Ok(()),
                ServiceState::Created => {
                    *state = ServiceState::Stopped;
                    return Ok(());
                }
                ServiceState::Running => *state = ServiceState::ShuttingDown,
            }
        }

        self.shutdown_tx.send_replace(true);

        let handles: Vec<JoinHandle<()>> = self.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Sweeper task ended abnormally: {}", e);
            }
        }

        *self.state.write().await = ServiceState::Stopped;
        info!("Secure-session core stopped");
        Ok(())
    }

    pub async fn state(&self) -> ServiceState {
        *self.state.read().await
    }

    pub fn auth(&self) -> Arc<AuthManager> {
        self.auth.clone()
    }

    pub fn exchanges(&self) -> Arc<KeyExchangeService> {
        self.exchanges.clone()
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    pub fn csrf(&self) -> Arc<CsrfTokenService> {
        self.csrf.clone()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

impl Drop for SecurityCore {
    fn drop(&mut self) {
        // Wakes a sweeper left running without an explicit shutdown
        self.shutdown_tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use std::time::Duration;

    const TEST_SWEEP_INTERVAL: Duration = Duration::from_millis(20);

    fn test_config() -> CoreConfig {
        CoreConfig {
            sweep_interval: TEST_SWEEP_INTERVAL,
            ..CoreConfig::default()
        }
    }

    fn core_with_clock(clock: Arc<ManualClock>) -> SecurityCore {
        SecurityCore::with_parts(
            test_config(),
            clock,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(Argon2Hasher::with_params(256, 1, 1).unwrap()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let core = core_with_clock(Arc::new(ManualClock::new()));
        assert_eq!(core.state().await, ServiceState::Created);

        core.start().await.unwrap();
        assert_eq!(core.state().await, ServiceState::Running);
        assert!(core.start().await.is_err());

        core.shutdown().await.unwrap();
        assert_eq!(core.state().await, ServiceState::Stopped);
        core.shutdown().await.unwrap();
        assert_eq!(core.state().await, ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let core = core_with_clock(Arc::new(ManualClock::new()));
        core.shutdown().await.unwrap();
        assert_eq!(core.state().await, ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let core = core_with_clock(Arc::new(ManualClock::new()));
        core.start().await.unwrap();
        core.shutdown().await.unwrap();
        core.start().await.unwrap();
        assert_eq!(core.state().await, ServiceState::Running);
        core.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_once_order_and_counts() {
        let clock = Arc::new(ManualClock::new());
        let core = core_with_clock(clock.clone());

        let session = core.sessions().create(1);
        core.csrf().issue(&session);
        core.csrf().issue("unrelated");
        core.exchanges().init_exchange().unwrap();

        // Past every default lifetime
        clock.advance(Duration::from_secs(2 * 3600));
        let report = core.sweep_once();

        // Both tokens expired on their own, before the session cascade ran
        assert_eq!(report.csrf_tokens, 2);
        assert_eq!(report.sessions, 1);
        assert_eq!(report.exchanges, 1);
        assert_eq!(core.sweep_once(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_background_sweeper_runs() {
        let clock = Arc::new(ManualClock::new());
        let core = core_with_clock(clock.clone());
        core.sessions().create(1);
        core.exchanges().init_exchange().unwrap();

        core.start().await.unwrap();
        clock.advance(Duration::from_secs(2 * 3600));

        let deadline = Instant::now() + Duration::from_secs(5);
        while core.sessions().session_count() > 0 || core.exchanges().pending_count() > 0 {
            assert!(Instant::now() < deadline, "sweeper never ran");
            time::sleep(TEST_SWEEP_INTERVAL).await;
        }

        core.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = CoreConfig {
            cookie_secret: vec![1, 2, 3],
            ..test_config()
        };
        let result = SecurityCore::with_parts(
            config,
            Arc::new(ManualClock::new()),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(Argon2Hasher::with_params(256, 1, 1).unwrap()),
        );
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
