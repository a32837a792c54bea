//! The edge agent's polling state machine.
//!
//! One cycle: fetch the rendered config, compare its fingerprint with the
//! last applied one, and when it differs validate, commit and reload. Fetches
//! never overlap; the only concurrency is the shutdown signal racing a sleep.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::{ConfigSource, verify_integrity};
use crate::config::BackoffPolicy;
use crate::proxy::ProxyController;
use crate::state::LocalState;

/// Where the poller currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Unchanged,
    Applying,
    Failed,
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fingerprint matched the applied one.
    Unchanged,
    /// A new map was validated, committed and reloaded.
    Applied { config_hash: String },
    /// The proxy refused the candidate; the previous map stays in place.
    Rejected,
    /// The map was committed but the reload failed. Retried next cycle.
    ReloadFailed,
    /// The config could not be fetched, verified or written.
    Failed,
}

impl PollOutcome {
    /// Whether this outcome resets backoff.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Applied { .. })
    }
}

/// Polls a [`ConfigSource`] and applies changes through a [`ProxyController`].
pub struct Poller<S, P> {
    source: S,
    proxy: P,
    local: LocalState,
    poll_interval: Duration,
    backoff: BackoffPolicy,
    attempt: u32,
    pending_reload: bool,
    state: PollState,
}

impl<S: ConfigSource, P: ProxyController> Poller<S, P> {
    pub const fn new(
        source: S,
        proxy: P,
        local: LocalState,
        poll_interval: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            source,
            proxy,
            local,
            poll_interval,
            backoff,
            attempt: 0,
            // A previous process may have committed a map without reloading.
            pending_reload: true,
            state: PollState::Idle,
        }
    }

    /// Consecutive unsuccessful cycles.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether a committed map still awaits a successful reload. True until
    /// the first successful reload, so a restart never strands a committed map.
    pub const fn pending_reload(&self) -> bool {
        self.pending_reload
    }

    pub const fn state(&self) -> PollState {
        self.state
    }

    /// Run one fetch/compare/apply cycle.
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.state = PollState::Fetching;
        let config = match self.source.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Config fetch failed");
                self.state = PollState::Failed;
                return PollOutcome::Failed;
            }
        };
        if let Err(e) = verify_integrity(&config) {
            warn!(error = %e, "Discarding config that fails its integrity check");
            self.state = PollState::Failed;
            return PollOutcome::Failed;
        }

        let applied = match self.local.load_fingerprint() {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Could not read applied fingerprint, treating as none");
                None
            }
        };

        if applied.as_deref() == Some(config.config_hash.as_str()) {
            self.state = PollState::Unchanged;
            if self.pending_reload {
                info!(config_hash = %config.config_hash, "Retrying pending proxy reload");
                return self.reload(PollOutcome::Unchanged).await;
            }
            debug!(config_hash = %config.config_hash, "Config unchanged");
            return PollOutcome::Unchanged;
        }

        self.state = PollState::Applying;
        info!(
            from = applied.as_deref().unwrap_or("none"),
            to = %config.config_hash,
            routes = config.routes.len(),
            "Config changed, validating candidate"
        );

        if let Err(e) = self.proxy.validate(&config.nginx_map).await {
            error!(
                config_hash = %config.config_hash,
                error = %e,
                "Proxy rejected candidate map, keeping previous map"
            );
            self.state = PollState::Failed;
            return PollOutcome::Rejected;
        }

        if let Err(e) = self.local.commit(&config.nginx_map, &config.config_hash) {
            error!(error = %e, "Failed to commit proxy map");
            self.state = PollState::Failed;
            return PollOutcome::Failed;
        }
        self.pending_reload = true;

        self.reload(PollOutcome::Applied {
            config_hash: config.config_hash,
        })
        .await
    }

    async fn reload(&mut self, on_success: PollOutcome) -> PollOutcome {
        match self.proxy.reload().await {
            Ok(()) => {
                self.pending_reload = false;
                on_success
            }
            Err(e) => {
                error!(error = %e, "Proxy reload failed, will retry next cycle");
                self.state = PollState::Failed;
                PollOutcome::ReloadFailed
            }
        }
    }

    /// Delay before the next cycle. Advances or resets the attempt counter.
    pub fn next_delay(&mut self, outcome: &PollOutcome) -> Duration {
        if outcome.is_success() {
            if self.attempt > 0 {
                info!(attempts = self.attempt, "Control plane sync recovered");
            }
            self.attempt = 0;
            return self.poll_interval;
        }
        let delay = self.backoff.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Poll until `shutdown` flips or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            map = %self.local.map_path().display(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "Edge agent polling started"
        );

        loop {
            if *shutdown.borrow() {
                info!("Edge agent shutting down");
                return;
            }

            let outcome = self.poll_once().await;
            let delay = self.next_delay(&outcome);
            self.state = PollState::Idle;
            if outcome.is_success() {
                debug!(?outcome, delay_ms = delay.as_millis(), "Next poll scheduled");
            } else {
                warn!(
                    ?outcome,
                    attempt = self.attempt,
                    delay_ms = delay.as_millis(),
                    "Backing off"
                );
            }

            tokio::select! {
                () = sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("Edge agent shutting down during poll wait");
                    return;
                }
            }
        }
    }
}
