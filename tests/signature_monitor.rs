//! Integration tests for the signature monitor
//!
//! The monitor polls a scripted fake of the portal API with millisecond
//! intervals, so the attempt-ceiling and cancellation behavior can be
//! asserted exactly without waiting out real minutes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use checkout::api::{
    ApiError, Contract, ContractStatus, Counterparty, NewCounterparty, Offer, PortalApi,
    SigningSession,
};
use checkout::services::{MonitorState, SignatureEvent, SignatureMonitor};

/// One scripted answer to a `get_contract` poll
#[derive(Debug, Clone, Copy)]
enum Poll {
    Status(ContractStatus),
    Error,
}

/// Portal fake that answers `get_contract` from a script. When the script
/// runs out, the last answer repeats. Optionally fires a shutdown signal
/// from inside the call, to simulate a cancellation racing an in-flight
/// request.
struct ScriptedPortal {
    script: Mutex<VecDeque<Poll>>,
    last: Poll,
    calls: AtomicUsize,
    shutdown_during_call: Mutex<Option<mpsc::Sender<()>>>,
}

impl ScriptedPortal {
    fn new(script: impl IntoIterator<Item = Poll>) -> Arc<Self> {
        let script: VecDeque<Poll> = script.into_iter().collect();
        let last = script
            .back()
            .copied()
            .unwrap_or(Poll::Status(ContractStatus::AwaitingSignature));
        Arc::new(Self {
            script: Mutex::new(script),
            last,
            calls: AtomicUsize::new(0),
            shutdown_during_call: Mutex::new(None),
        })
    }

    fn always(answer: Poll) -> Arc<Self> {
        Self::new([answer])
    }

    fn shutdown_during_call(&self, tx: mpsc::Sender<()>) {
        *self.shutdown_during_call.lock().unwrap() = Some(tx);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalApi for ScriptedPortal {
    async fn list_offers(&self) -> Result<Vec<Offer>, ApiError> {
        unimplemented!("monitor only fetches contracts")
    }

    async fn create_counterparty(&self, _new: &NewCounterparty) -> Result<Counterparty, ApiError> {
        unimplemented!("monitor only fetches contracts")
    }

    async fn create_draft(
        &self,
        _counterparty_id: i64,
        _offer_id: i64,
    ) -> Result<Contract, ApiError> {
        unimplemented!("monitor only fetches contracts")
    }

    async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let shutdown_tx = self.shutdown_during_call.lock().unwrap().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }

        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.last);
        match answer {
            Poll::Status(status) => Ok(contract(contract_id, status)),
            Poll::Error => Err(ApiError::network("connection reset")),
        }
    }

    async fn start_signing(&self, _contract_id: &str) -> Result<SigningSession, ApiError> {
        unimplemented!("monitor only fetches contracts")
    }

    fn draft_pdf_url(&self, contract_id: &str) -> String {
        format!("http://fake/contracts/{contract_id}/draft-pdf")
    }

    fn signed_pdf_url(&self, contract_id: &str) -> String {
        format!("http://fake/contracts/{contract_id}/signed-pdf")
    }
}

fn contract(id: &str, status: ContractStatus) -> Contract {
    Contract {
        id: id.to_string(),
        status,
        counterparty_id: 7,
        offer_id: 3,
        draft_pdf_available: true,
        counterparty: None,
        offer: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn monitor(
    portal: &Arc<ScriptedPortal>,
    event_tx: mpsc::UnboundedSender<SignatureEvent>,
) -> SignatureMonitor {
    SignatureMonitor::new(portal.clone(), "c-1", event_tx)
        .with_poll_interval(Duration::from_millis(2))
}

#[tokio::test]
async fn test_signed_on_first_fetch_stops_without_second_poll() {
    let portal = ScriptedPortal::always(Poll::Status(ContractStatus::Signed));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut monitor = monitor(&portal, event_tx);
    monitor.run().await;

    assert_eq!(portal.calls(), 1);
    assert_eq!(monitor.state(), MonitorState::Stopped);

    match event_rx.try_recv().unwrap() {
        SignatureEvent::Signed { contract } => assert_eq!(contract.id, "c-1"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(event_rx.try_recv().is_err(), "exactly one event expected");
}

#[tokio::test]
async fn test_never_signed_polls_to_the_ceiling_then_times_out() {
    let portal = ScriptedPortal::always(Poll::Status(ContractStatus::AwaitingSignature));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut monitor = monitor(&portal, event_tx).with_max_attempts(24);
    monitor.run().await;

    assert_eq!(portal.calls(), 24);
    assert_eq!(monitor.state(), MonitorState::Stopped);

    match event_rx.try_recv().unwrap() {
        SignatureEvent::TimedOut { attempts } => assert_eq!(attempts, 24),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(event_rx.try_recv().is_err(), "exactly one event expected");
}

#[tokio::test]
async fn test_poll_errors_are_tolerated_and_counted() {
    // Two transient failures, then the signature comes through
    let portal = ScriptedPortal::new([
        Poll::Error,
        Poll::Error,
        Poll::Status(ContractStatus::Signed),
    ]);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut monitor = monitor(&portal, event_tx).with_max_attempts(5);
    monitor.run().await;

    assert_eq!(portal.calls(), 3);
    assert!(matches!(
        event_rx.try_recv().unwrap(),
        SignatureEvent::Signed { .. }
    ));
}

#[tokio::test]
async fn test_only_errors_still_hit_the_ceiling() {
    let portal = ScriptedPortal::always(Poll::Error);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut monitor = monitor(&portal, event_tx).with_max_attempts(3);
    monitor.run().await;

    assert_eq!(portal.calls(), 3);
    match event_rx.try_recv().unwrap() {
        SignatureEvent::TimedOut { attempts } => assert_eq!(attempts, 3),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_cancellation_before_first_poll() {
    let portal = ScriptedPortal::always(Poll::Status(ContractStatus::Signed));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    shutdown_tx.send(()).await.unwrap();

    let mut monitor = monitor(&portal, event_tx).with_shutdown(shutdown_rx);
    monitor.run().await;

    assert_eq!(portal.calls(), 0, "no poll should fire after cancellation");
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(event_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_response_arriving_after_cancellation_is_discarded() {
    // The fake fires the shutdown signal from inside the in-flight fetch;
    // the response still arrives but must have no observable effect.
    let portal = ScriptedPortal::always(Poll::Status(ContractStatus::Signed));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    portal.shutdown_during_call(shutdown_tx);

    let mut monitor = monitor(&portal, event_tx).with_shutdown(shutdown_rx);
    monitor.run().await;

    assert_eq!(portal.calls(), 1);
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(
        event_rx.try_recv().is_err(),
        "discarded response must not emit an event"
    );
}
