//! Request/response correlation by 16-bit id.
//!
//! Every request gets an entry keyed by its id. The entry leaves the table
//! exactly once: on its response, on its timeout, or when it is cancelled or
//! rejected. Each entry's timer carries a ticket so that a stale timer can
//! never expire a newer entry that reused the same id.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use loa_message::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::lock;

/// Live state of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for an inline or raw response.
    Pending,
    /// A raw response arrived; waiting for the raw frame with the payload.
    AwaitingRaw { success: bool },
}

struct Entry {
    state: RequestState,
    ticket: u64,
    timer: AbortHandle,
    tx: oneshot::Sender<Result<Value>>,
}

impl Entry {
    fn settle(self, result: Result<Value>) {
        self.timer.abort();
        // The caller may have stopped waiting.
        let _ = self.tx.send(result);
    }
}

#[derive(Default)]
struct State {
    next_id: u16,
    next_ticket: u64,
    entries: HashMap<u16, Entry>,
    awaiting_raw: VecDeque<u16>,
}

impl State {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn pop_awaiting_raw(&mut self) -> Option<(u16, Entry)> {
        while let Some(id) = self.awaiting_raw.pop_front() {
            if let Some(entry) = self.entries.remove(&id) {
                return Some((id, entry));
            }
        }
        None
    }

    fn take(&mut self, id: u16) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        if matches!(entry.state, RequestState::AwaitingRaw { .. }) {
            self.awaiting_raw.retain(|queued| *queued != id);
        }
        Some(entry)
    }
}

/// Tracks in-flight requests. Clones share the same table.
#[derive(Clone)]
pub struct RequestCorrelator {
    state: Arc<Mutex<State>>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::default(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate the next id: 0, 1, ... 65535, then 0 again.
    pub fn next_id(&self) -> u16 {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id = id.wrapping_add(1);
        id
    }

    /// Start tracking `id` and arm its timeout.
    ///
    /// Must be called inside a tokio runtime. If `id` is still pending from
    /// an earlier request, that request is rejected with
    /// [`BridgeError::Superseded`].
    pub fn register(&self, id: u16) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let superseded = {
            let mut state = lock(&self.state);
            let superseded = state.take(id);
            let ticket = state.ticket();
            let timer = self.arm(id, ticket);
            state.entries.insert(
                id,
                Entry {
                    state: RequestState::Pending,
                    ticket,
                    timer,
                    tx,
                },
            );
            superseded
        };

        if let Some(old) = superseded {
            warn!(id, "request id reused while still pending");
            old.settle(Err(BridgeError::Superseded(id)));
        }
        PendingResponse { id, rx }
    }

    /// Settle `id` with an inline response.
    ///
    /// Returns `false` if nothing was waiting for `id`.
    pub fn on_response(&self, id: u16, success: bool, payload: Value) -> bool {
        let Some(entry) = lock(&self.state).take(id) else {
            debug!(id, "ignoring response without a pending request");
            return false;
        };
        debug!(id, success, "request settled");
        entry.settle(outcome(success, payload));
        true
    }

    /// Mark `id` as answered with its payload still to come as a raw frame.
    ///
    /// The timeout starts over for the raw frame.
    pub fn on_raw_response(&self, id: u16, success: bool) -> bool {
        let mut state = lock(&self.state);
        let ticket = state.ticket();
        let Some(entry) = state.entries.get_mut(&id) else {
            debug!(id, "ignoring raw response without a pending request");
            return false;
        };
        if entry.state != RequestState::Pending {
            debug!(id, "ignoring duplicate raw response");
            return false;
        }
        entry.timer.abort();
        entry.timer = self.arm(id, ticket);
        entry.ticket = ticket;
        entry.state = RequestState::AwaitingRaw { success };
        state.awaiting_raw.push_back(id);
        debug!(id, success, "awaiting raw payload");
        true
    }

    /// Hand a captured raw frame to the oldest request awaiting one.
    pub fn on_raw_data(&self, data: Bytes) -> bool {
        let Some((id, entry)) = lock(&self.state).pop_awaiting_raw() else {
            return false;
        };
        let success = matches!(entry.state, RequestState::AwaitingRaw { success: true });
        debug!(id, success, len = data.len(), "request settled with raw payload");
        entry.settle(outcome(success, Value::Blob(data)));
        true
    }

    /// Fail the oldest request awaiting a raw frame: that frame was lost.
    pub fn on_raw_lost(&self, reason: &str) -> bool {
        let Some((id, entry)) = lock(&self.state).pop_awaiting_raw() else {
            return false;
        };
        warn!(id, reason, "raw payload lost");
        entry.settle(Err(BridgeError::RawFrameLost(reason.to_string())));
        true
    }

    /// Stop tracking `id`; its waiter sees the request as cancelled.
    pub fn cancel(&self, id: u16) -> bool {
        match lock(&self.state).take(id) {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Reject every pending request with [`BridgeError::Disconnected`].
    pub fn reject_all(&self, reason: &str) -> usize {
        let entries: Vec<(u16, Entry)> = {
            let mut state = lock(&self.state);
            state.awaiting_raw.clear();
            state.entries.drain().collect()
        };
        let count = entries.len();
        for (id, entry) in entries {
            debug!(id, reason, "rejecting pending request");
            entry.settle(Err(BridgeError::Disconnected(reason.to_string())));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn state(&self, id: u16) -> Option<RequestState> {
        lock(&self.state).entries.get(&id).map(|entry| entry.state)
    }

    fn arm(&self, id: u16, ticket: u64) -> AbortHandle {
        let state = Arc::downgrade(&self.state);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let expired = {
                let mut state = lock(&state);
                let current = state
                    .entries
                    .get(&id)
                    .is_some_and(|entry| entry.ticket == ticket);
                if current {
                    state.take(id)
                } else {
                    None
                }
            };
            if let Some(entry) = expired {
                debug!(id, ?timeout, "request timed out");
                let _ = entry.tx.send(Err(BridgeError::Timeout(timeout)));
            }
        })
        .abort_handle()
    }
}

impl fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn outcome(success: bool, payload: Value) -> Result<Value> {
    if success {
        Ok(payload)
    } else {
        Err(BridgeError::RequestFailed(payload))
    }
}

/// Resolves with the response payload of one request.
#[derive(Debug)]
pub struct PendingResponse {
    id: u16,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    pub fn id(&self) -> u16 {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(BridgeError::Disconnected("request cancelled".into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    #[tokio::test(start_paused = true)]
    async fn success_resolves_with_payload() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let id = correlator.next_id();
        let pending = correlator.register(id);
        assert_eq!(correlator.state(id), Some(RequestState::Pending));

        assert!(correlator.on_response(id, true, Value::Bool(true)));
        assert_eq!(pending.await.unwrap(), Value::Bool(true));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_rejects_with_device_payload() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let pending = correlator.register(3);
        correlator.on_response(3, false, Value::from("no such file"));

        match pending.await {
            Err(BridgeError::RequestFailed(payload)) => {
                assert_eq!(payload, Value::from("no such file"))
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let start = Instant::now();
        let pending = correlator.register(0);

        assert!(matches!(pending.await, Err(BridgeError::Timeout(t)) if t == TIMEOUT));
        assert!(start.elapsed() >= TIMEOUT);
        assert_eq!(correlator.pending_count(), 0);
        assert!(!correlator.on_response(0, true, Value::Nil));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_affect_other_requests() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let silent = correlator.register(1);
        let answered = correlator.register(2);

        let responder = correlator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            responder.on_response(2, true, Value::Int(42));
        });

        assert_eq!(answered.await.unwrap(), Value::Int(42));
        assert!(matches!(silent.await, Err(BridgeError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_responses_reach_their_own_callers() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let first = correlator.register(10);
        let second = correlator.register(11);

        correlator.on_response(11, true, Value::from("second"));
        correlator.on_response(10, true, Value::from("first"));

        assert_eq!(first.await.unwrap(), Value::from("first"));
        assert_eq!(second.await.unwrap(), Value::from("second"));
    }

    #[test]
    fn ids_wrap_after_u16_max() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let ids: Vec<u16> = (0..65537).map(|_| correlator.next_id()).collect();
        assert_eq!(ids[0], 0);
        assert_eq!(ids[65535], 65535);
        assert_eq!(ids[65536], 0);
        assert!(ids.windows(2).take(65535).all(|w| w[1] == w[0] + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn reused_id_supersedes_old_request() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let old = correlator.register(5);
        let new = correlator.register(5);

        assert!(matches!(old.await, Err(BridgeError::Superseded(5))));
        correlator.on_response(5, true, Value::Int(1));
        assert_eq!(new.await.unwrap(), Value::Int(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_expire_reused_id() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let _old = correlator.register(9);
        tokio::time::sleep(Duration::from_millis(600)).await;
        let new = correlator.register(9);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(correlator.state(9), Some(RequestState::Pending));
        correlator.on_response(9, true, Value::Nil);
        assert_eq!(new.await.unwrap(), Value::Nil);
    }

    #[tokio::test(start_paused = true)]
    async fn raw_response_waits_for_raw_frame() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let pending = correlator.register(4);

        assert!(!correlator.on_raw_data(Bytes::from_static(b"unrelated")));
        assert!(correlator.on_raw_response(4, true));
        assert_eq!(
            correlator.state(4),
            Some(RequestState::AwaitingRaw { success: true })
        );
        assert!(!correlator.on_raw_response(4, true));
        assert!(correlator.on_raw_data(Bytes::from_static(b"-- init.lua")));

        assert_eq!(
            pending.await.unwrap(),
            Value::Blob(Bytes::from_static(b"-- init.lua"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn raw_failure_rejects_with_raw_payload() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let pending = correlator.register(4);
        correlator.on_raw_response(4, false);
        correlator.on_raw_data(Bytes::from_static(b"sd card missing"));

        assert!(matches!(
            pending.await,
            Err(BridgeError::RequestFailed(Value::Blob(b))) if b.as_ref() == b"sd card missing"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn lost_raw_frame_fails_oldest_awaiting_request() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let first = correlator.register(1);
        let second = correlator.register(2);
        correlator.on_raw_response(1, true);
        correlator.on_raw_response(2, true);

        assert!(correlator.on_raw_lost("packet too large"));
        assert!(correlator.on_raw_data(Bytes::from_static(b"second")));
        assert!(!correlator.on_raw_lost("nobody waiting"));

        assert!(matches!(
            first.await,
            Err(BridgeError::RawFrameLost(reason)) if reason == "packet too large"
        ));
        assert_eq!(
            second.await.unwrap(),
            Value::Blob(Bytes::from_static(b"second"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn raw_response_rearms_deadline() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let start = Instant::now();
        let pending = correlator.register(6);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(correlator.on_raw_response(6, true));

        assert!(matches!(pending.await, Err(BridgeError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(1900));
    }

    #[tokio::test(start_paused = true)]
    async fn reject_all_settles_everything() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let a = correlator.register(1);
        let b = correlator.register(2);
        correlator.on_raw_response(2, true);

        assert_eq!(correlator.reject_all("port closed"), 2);
        assert!(matches!(a.await, Err(BridgeError::Disconnected(r)) if r == "port closed"));
        assert!(matches!(b.await, Err(BridgeError::Disconnected(_))));
        assert!(!correlator.on_raw_data(Bytes::from_static(b"late")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_entry() {
        let correlator = RequestCorrelator::new(TIMEOUT);
        let pending = correlator.register(8);
        assert_eq!(pending.id(), 8);
        assert!(correlator.cancel(8));
        assert!(!correlator.cancel(8));
        assert!(matches!(pending.await, Err(BridgeError::Disconnected(_))));
    }
}
