//! Signature monitor - bounded polling for contract signature completion.
//!
//! After a signing session is started the contract's status only changes on
//! the server (the e-sign provider calls back there). This monitor polls
//! `GET /contracts/{id}` on a fixed interval until the contract reports
//! `signed`, or a ceiling of attempts is reached.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{Contract, PortalApi};

/// Default poll interval
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default attempt ceiling (a 2-minute bound at the default interval)
const DEFAULT_MAX_ATTEMPTS: u32 = 24;

/// Observable monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created, not yet running
    Idle,
    /// Poll loop in progress
    Polling,
    /// Terminal: signed, timed out, or cancelled
    Stopped,
}

/// Event emitted when the monitor reaches a terminal condition
#[derive(Debug, Clone)]
pub enum SignatureEvent {
    /// The contract reported `signed`
    Signed { contract: Contract },
    /// The attempt ceiling was reached without a signature
    TimedOut { attempts: u32 },
}

/// Polls one contract until it is signed, the attempt ceiling is hit, or
/// the monitor is cancelled.
///
/// Polls are strictly sequential: the next wait only starts after the
/// previous response has been fully processed. Transport and parse errors
/// are tolerated; they consume an attempt and the loop continues.
pub struct SignatureMonitor {
    api: Arc<dyn PortalApi>,
    contract_id: String,
    poll_interval: Duration,
    max_attempts: u32,
    state: MonitorState,
    event_tx: mpsc::UnboundedSender<SignatureEvent>,
    shutdown_rx: Option<mpsc::Receiver<()>>,
}

impl SignatureMonitor {
    pub fn new(
        api: Arc<dyn PortalApi>,
        contract_id: impl Into<String>,
        event_tx: mpsc::UnboundedSender<SignatureEvent>,
    ) -> Self {
        Self {
            api,
            contract_id: contract_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: MonitorState::Idle,
            event_tx,
            shutdown_rx: None,
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the attempt ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set shutdown receiver for cooperative cancellation
    pub fn with_shutdown(mut self, rx: mpsc::Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Run the poll loop to a terminal state
    pub async fn run(&mut self) {
        self.state = MonitorState::Polling;
        info!(
            contract_id = %self.contract_id,
            interval = ?self.poll_interval,
            max_attempts = self.max_attempts,
            "signature monitor started"
        );

        let mut attempts: u32 = 0;

        loop {
            // Wait out the interval; a cancellation arriving meanwhile wins.
            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                _ = Self::recv_shutdown(&mut self.shutdown_rx) => {
                    info!(contract_id = %self.contract_id, "signature monitor cancelled");
                    self.state = MonitorState::Stopped;
                    return;
                }
            }

            let poll = self.api.get_contract(&self.contract_id).await;

            // The request itself is never aborted; a cancellation that raced
            // it means its response must have no observable effect.
            if self.shutdown_requested() {
                info!(contract_id = %self.contract_id, "signature monitor cancelled, discarding poll response");
                self.state = MonitorState::Stopped;
                return;
            }

            attempts += 1;
            match poll {
                Ok(contract) if contract.is_signed() => {
                    info!(contract_id = %self.contract_id, attempts, "contract signed");
                    let _ = self.event_tx.send(SignatureEvent::Signed { contract });
                    self.state = MonitorState::Stopped;
                    return;
                }
                Ok(contract) => {
                    debug!(
                        contract_id = %self.contract_id,
                        status = %contract.status,
                        attempt = attempts,
                        "contract not signed yet"
                    );
                }
                Err(err) => {
                    // Transient errors are tolerated; they still count
                    // against the ceiling.
                    warn!(
                        contract_id = %self.contract_id,
                        attempt = attempts,
                        "signature poll failed: {}",
                        err
                    );
                }
            }

            if attempts >= self.max_attempts {
                info!(
                    contract_id = %self.contract_id,
                    attempts,
                    "signature polling gave up"
                );
                let _ = self.event_tx.send(SignatureEvent::TimedOut { attempts });
                self.state = MonitorState::Stopped;
                return;
            }
        }
    }

    async fn recv_shutdown(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    fn shutdown_requested(&mut self) -> bool {
        self.shutdown_rx
            .as_mut()
            .map(|rx| rx.try_recv().is_ok())
            .unwrap_or(false)
    }
}
