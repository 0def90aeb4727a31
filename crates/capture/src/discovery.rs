//! Discovery loop
//!
//! Periodically probes every configured target and starts recording each
//! new match it finds. The registry maps a target's base URL to its live
//! session; only this task touches it, so no locking is needed. Probe
//! failures are the normal case - most ports host nothing most of the time -
//! and never stop the scan.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use evrcap_config::AgentConfig;
use evrcap_protocol::{SessionMeta, Target};
use tokio_util::sync::CancellationToken;

use crate::client;
use crate::outputs::SinkFactory;
use crate::poller::run_poller;
use crate::probe::{probe_session, Probe, ProbeError};
use crate::session::MatchSession;

/// Pause between full scan cycles
const SCAN_CYCLE: Duration = Duration::from_secs(3);

/// Pacing between probes inside one cycle, to avoid bursting
const TARGET_PACING: Duration = Duration::from_millis(10);

/// How long shutdown waits for sessions to report Stopped
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

/// The discovery task: owns the target list and the session registry.
pub struct Discovery {
    targets: Vec<Target>,
    interval: Duration,
    registry: HashMap<String, MatchSession>,
    probe_client: reqwest::Client,
    poll_client: reqwest::Client,
    outputs: SinkFactory,
    cancel: CancellationToken,

    /// Targets already warned about having their API disabled
    api_disabled_warned: HashSet<String>,
}

impl Discovery {
    /// Build the discovery task and its HTTP clients.
    pub fn new(
        config: AgentConfig,
        targets: Vec<Target>,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            targets,
            interval: config.interval(),
            registry: HashMap::new(),
            probe_client: client::probe_client()?,
            poll_client: client::polling_client()?,
            outputs: SinkFactory::new(config),
            cancel,
            api_disabled_warned: HashSet::new(),
        })
    }

    /// Scan until cancelled, then close every session and wait for them to
    /// stop.
    pub async fn run(mut self) {
        tracing::info!(
            targets = self.targets.len(),
            interval_ms = self.interval.as_millis() as u64,
            "discovery started"
        );

        loop {
            self.scan_cycle().await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(SCAN_CYCLE) => {}
            }
        }

        self.shutdown().await;
    }

    /// Probe every target once, in insertion order.
    async fn scan_cycle(&mut self) {
        let targets = self.targets.clone();
        for target in &targets {
            if self.cancel.is_cancelled() {
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(TARGET_PACING) => {}
            }

            let base_url = target.base_url();

            if let Some(session) = self.registry.get(&base_url) {
                if !session.is_stopped() {
                    continue;
                }
                // Stopped sessions free their slot for a new match
                self.registry.remove(&base_url);
            }

            match probe_session(&self.probe_client, &base_url).await {
                Ok(Probe::Inactive) => {}
                Ok(Probe::Active(meta)) => self.start_session(&base_url, meta).await,
                Err(ProbeError::ApiAccessDisabled) => {
                    if self.api_disabled_warned.insert(base_url.clone()) {
                        tracing::warn!(addr = %target, "API access is disabled on the server");
                    }
                }
                Err(ProbeError::Malformed(detail)) => {
                    tracing::warn!(addr = %target, detail, "malformed session response");
                }
                Err(ProbeError::UnexpectedStatus(status)) => {
                    tracing::warn!(addr = %target, status, "unrecognised probe status");
                }
                Err(ProbeError::Http(err)) => {
                    tracing::debug!(addr = %target, error = %err, "probe failed");
                }
            }
        }
    }

    async fn start_session(&mut self, base_url: &str, meta: SessionMeta) {
        let sink = match self.outputs.build(&meta, Utc::now(), &self.cancel).await {
            Ok(sink) => sink,
            Err(err) => {
                tracing::error!(
                    base_url,
                    session_uuid = %meta.session_uuid,
                    error = %err,
                    "failed to set up outputs, skipping match"
                );
                return;
            }
        };

        let session = MatchSession::spawn(
            &self.cancel,
            base_url,
            meta.session_uuid.clone(),
            sink,
        );
        tokio::spawn(run_poller(
            self.poll_client.clone(),
            session.clone(),
            self.interval,
        ));

        tracing::info!(
            base_url,
            session_uuid = %meta.session_uuid,
            match_type = %meta.match_type,
            "recording new match"
        );
        self.registry.insert(base_url.to_string(), session);
    }

    /// Close every registered session and wait, bounded, for each to stop.
    async fn shutdown(self) {
        tracing::info!(sessions = self.registry.len(), "discovery stopping");

        for session in self.registry.values() {
            session.close();
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_WAIT;
        for session in self.registry.values() {
            while !session.is_stopped() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }

        tracing::info!("all sessions closed");
    }
}
