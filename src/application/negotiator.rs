//! CapabilityNegotiator - discovers a session's capabilities and keeps its
//! event stream alive.
//!
//! ## Lifecycle
//!
//! 1. `start()` issues the seed request (only while the session is connected)
//! 2. A mapping response replaces the capability table; if it grants
//!    `EventQueueGet` an `EventStream` is started against that URI
//! 3. A not-found response is terminal; any other failure re-issues the
//!    request under the configured `RetryPolicy`
//! 4. `disconnect()` abandons whatever is in flight and clears the table
//!
//! Every seed task and stream carries the generation it was started under.
//! Results from an older generation are discarded under the control lock,
//! so nothing started before a `disconnect` can change state after it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, Secret};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::domain::capabilities::{CapabilityTable, NegotiatorState, SeedRequest, EVENT_QUEUE_GET};
use crate::domain::foundation::{SessionId, StateMachine};
use crate::domain::messages::CapsEvent;
use crate::ports::{EventQueueTransport, SeedClient, SeedError, SessionLink};

use super::event_stream::{EventStream, EventStreamListener, StopReason};
use super::router::CapsEventRouter;

/// Delay schedule for re-issuing a failed seed request.
///
/// Attempt `n` waits `initial * 2^(n-1)`, capped at `max`. A zero initial
/// delay retries immediately every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Delay before re-issuing after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << shift)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

/// Tuning knobs for a negotiator.
#[derive(Debug, Clone)]
pub struct NegotiatorOptions {
    pub retry: RetryPolicy,
    pub poll_error_delay: Duration,
}

impl Default for NegotiatorOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_error_delay: Duration::from_secs(1),
        }
    }
}

/// Capability negotiation for one session. Cheap to clone.
#[derive(Clone)]
pub struct CapabilityNegotiator {
    inner: Arc<Inner>,
}

struct Inner {
    seed_uri: Secret<String>,
    session: Arc<dyn SessionLink>,
    seed_client: Arc<dyn SeedClient>,
    transport: Arc<dyn EventQueueTransport>,
    router: Arc<CapsEventRouter>,
    options: NegotiatorOptions,
    capabilities: RwLock<CapabilityTable>,
    state: watch::Sender<NegotiatorState>,
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    generation: u64,
    seed_task: Option<JoinHandle<()>>,
    stream: Option<EventStream>,
}

impl CapabilityNegotiator {
    pub fn new(
        seed_uri: Secret<String>,
        session: Arc<dyn SessionLink>,
        seed_client: Arc<dyn SeedClient>,
        transport: Arc<dyn EventQueueTransport>,
        router: Arc<CapsEventRouter>,
        options: NegotiatorOptions,
    ) -> Self {
        let (state, _) = watch::channel(NegotiatorState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                seed_uri,
                session,
                seed_client,
                transport,
                router,
                options,
                capabilities: RwLock::new(CapabilityTable::new()),
                state,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Issues the seed request.
    ///
    /// Does nothing unless the session is connected and negotiation is
    /// `Disconnected`. Returns true if a request went out. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let session_id = self.inner.session.session_id();
        if !self.inner.session.is_connected() {
            tracing::debug!(%session_id, "Session not connected, skipping capability negotiation");
            return false;
        }

        let seed_uri = match Url::parse(self.inner.seed_uri.expose_secret()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(%session_id, error = %e, "Seed capability is not a valid URL");
                return false;
            }
        };

        let mut control = self.inner.control.lock();
        let current = self.state();
        if current != NegotiatorState::Disconnected {
            tracing::debug!(%session_id, state = %current, "Negotiation already underway");
            return false;
        }
        if !self.inner.transition(NegotiatorState::AwaitingSeedResponse) {
            return false;
        }

        control.generation += 1;
        let generation = control.generation;
        let inner = Arc::clone(&self.inner);
        control.seed_task = Some(tokio::spawn(async move {
            inner.negotiate(seed_uri, generation).await;
        }));
        true
    }

    /// Abandons in-flight work, stops the event stream and forgets every
    /// capability. Safe to call in any state.
    ///
    /// `immediate = false` lets the stream send its closing request in the
    /// background.
    pub fn disconnect(&self, immediate: bool) {
        drop(self.inner.detach(immediate));
    }

    /// Graceful disconnect that waits for the stream's closing request.
    pub async fn close(&self) {
        if let Some(stream) = self.inner.detach(false) {
            stream.join().await;
        }
    }

    /// Endpoint for `name`, if the server granted it.
    pub fn capability_uri(&self, name: &str) -> Option<Url> {
        self.inner.capabilities.read().get(name).cloned()
    }

    /// Names of every granted capability, sorted.
    pub fn capability_names(&self) -> Vec<String> {
        self.inner
            .capabilities
            .read()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn is_event_stream_running(&self) -> bool {
        self.state().is_event_stream_running()
    }

    pub fn state(&self) -> NegotiatorState {
        *self.inner.state.borrow()
    }

    /// Receiver that sees every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<NegotiatorState> {
        self.inner.state.subscribe()
    }

    pub fn session_id(&self) -> SessionId {
        self.inner.session.session_id()
    }
}

impl Inner {
    /// Applies a validated transition. Invalid ones are logged and refused.
    fn transition(&self, next: NegotiatorState) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|current| match current.transition_to(next) {
            Ok(state) => {
                tracing::debug!(from = %current, to = %state, "Negotiator state changed");
                *current = state;
                applied = true;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refusing negotiator state change");
                false
            }
        });
        applied
    }

    fn is_current(&self, generation: u64) -> bool {
        self.control.lock().generation == generation
    }

    async fn negotiate(self: Arc<Self>, seed_uri: Url, generation: u64) {
        let session_id = self.session.session_id();
        let request = SeedRequest::standard();
        tracing::info!(
            %session_id,
            revision = request.revision(),
            capabilities = request.names().len(),
            "Requesting seed capabilities"
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.seed_client.request(&seed_uri, &request).await {
                Ok(raw) => {
                    self.apply_seed_response(raw, generation);
                    return;
                }
                Err(e) if e.is_terminal() => {
                    self.terminate(&e, generation);
                    return;
                }
                Err(e) => {
                    if !self.is_current(generation) {
                        return;
                    }
                    let delay = self.options.retry.delay_for(attempt);
                    tracing::warn!(
                        %session_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Seed request failed, retrying"
                    );
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn apply_seed_response(self: &Arc<Self>, raw: HashMap<String, String>, generation: u64) {
        let session_id = self.session.session_id();
        let (table, rejected) = CapabilityTable::from_raw(raw);
        for e in &rejected {
            tracing::warn!(%session_id, error = %e, "Ignoring capability entry");
        }

        let mut control = self.control.lock();
        if control.generation != generation {
            tracing::debug!(%session_id, "Discarding seed response from an abandoned request");
            return;
        }
        control.seed_task = None;

        let queue_uri = table.get(EVENT_QUEUE_GET).cloned();
        let granted = table.len();
        self.capabilities.write().replace_all(table);

        let event_stream_running = match queue_uri {
            Some(uri) => {
                let listener = Arc::new(StreamBridge {
                    inner: Arc::downgrade(self),
                    generation,
                });
                control.stream = Some(EventStream::start(
                    uri,
                    Arc::clone(&self.transport),
                    listener,
                    self.options.poll_error_delay,
                ));
                true
            }
            None => false,
        };

        tracing::info!(%session_id, granted, event_stream_running, "Capabilities negotiated");
        self.transition(NegotiatorState::Active {
            event_stream_running,
        });
    }

    fn terminate(&self, error: &SeedError, generation: u64) {
        let mut control = self.control.lock();
        if control.generation != generation {
            return;
        }
        control.seed_task = None;
        tracing::error!(
            session_id = %self.session.session_id(),
            error = %error,
            "Seed capability unavailable, giving up"
        );
        self.transition(NegotiatorState::Terminated);
    }

    /// Invalidates the current generation and hands back the stream, if
    /// any, already told to stop.
    fn detach(&self, immediate: bool) -> Option<EventStream> {
        let mut control = self.control.lock();
        control.generation += 1;

        if let Some(task) = control.seed_task.take() {
            task.abort();
        }
        let stream = control.stream.take();
        if let Some(stream) = &stream {
            stream.stop(immediate);
        }

        self.capabilities.write().clear();

        let current = *self.state.borrow();
        if matches!(
            current,
            NegotiatorState::AwaitingSeedResponse | NegotiatorState::Active { .. }
        ) {
            self.transition(NegotiatorState::Disconnected);
            tracing::info!(session_id = %self.session.session_id(), immediate, "Capabilities disconnected");
        }
        stream
    }
}

/// Forwards stream activity into the negotiator for one generation.
struct StreamBridge {
    inner: Weak<Inner>,
    generation: u64,
}

impl StreamBridge {
    fn live(&self) -> Option<Arc<Inner>> {
        let inner = self.inner.upgrade()?;
        inner.is_current(self.generation).then_some(inner)
    }
}

impl EventStreamListener for StreamBridge {
    fn on_connected(&self) {
        if let Some(inner) = self.live() {
            inner.session.event_queue_connected();
        }
    }

    fn on_event(&self, event: CapsEvent) {
        if let Some(inner) = self.live() {
            inner.router.route(event, inner.session.session_id());
        }
    }

    fn on_stopped(&self, reason: StopReason) {
        if reason != StopReason::QueueGone {
            return;
        }
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let control = inner.control.lock();
        if control.generation == self.generation {
            inner.transition(NegotiatorState::Active {
                event_stream_running: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::decoder::EventDecoder;
    use crate::application::dispatch::{CapsDispatchTable, WILDCARD};
    use crate::application::inbound::{PacketQueue, PacketReceiver};
    use crate::domain::messages::DecodedMessage;
    use crate::ports::{CapsEventHandler, HandlerError, PollError, PollRequest, PollResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeSession {
        id: SessionId,
        connected: AtomicBool,
        queue_connected: AtomicUsize,
    }

    impl FakeSession {
        fn connected() -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(),
                connected: AtomicBool::new(true),
                queue_connected: AtomicUsize::new(0),
            })
        }
    }

    impl SessionLink for FakeSession {
        fn session_id(&self) -> SessionId {
            self.id
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn event_queue_connected(&self) {
            self.queue_connected.fetch_add(1, Ordering::SeqCst);
        }
    }

    type SeedResult = Result<HashMap<String, String>, SeedError>;

    /// Seed endpoint that replays a script, then never answers.
    struct ScriptedSeed {
        script: Mutex<VecDeque<SeedResult>>,
        calls: AtomicUsize,
    }

    impl ScriptedSeed {
        fn new(script: Vec<SeedResult>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SeedClient for ScriptedSeed {
        async fn request(&self, _uri: &Url, request: &SeedRequest) -> SeedResult {
            assert!(request.names().contains(&EVENT_QUEUE_GET));
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    struct ScriptedQueue {
        script: Mutex<VecDeque<Result<PollResponse, PollError>>>,
    }

    impl ScriptedQueue {
        fn new(script: Vec<Result<PollResponse, PollError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl EventQueueTransport for ScriptedQueue {
        async fn poll(&self, _uri: &Url, request: PollRequest) -> Result<PollResponse, PollError> {
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None if request.done => Ok(PollResponse::empty()),
                None => std::future::pending().await,
            }
        }
    }

    struct Harness {
        negotiator: CapabilityNegotiator,
        session: Arc<FakeSession>,
        seed: Arc<ScriptedSeed>,
        caps_table: Arc<CapsDispatchTable>,
        _packets: PacketReceiver,
    }

    fn harness(seed: Vec<SeedResult>, polls: Vec<Result<PollResponse, PollError>>) -> Harness {
        let session = FakeSession::connected();
        let seed = ScriptedSeed::new(seed);
        let caps_table = Arc::new(CapsDispatchTable::new());
        let (queue, packets) = PacketQueue::channel();
        let router = Arc::new(CapsEventRouter::new(
            EventDecoder::with_defaults(),
            caps_table.clone(),
            queue,
        ));
        let negotiator = CapabilityNegotiator::new(
            Secret::new("https://sim.example.com/seed".to_string()),
            session.clone(),
            seed.clone(),
            ScriptedQueue::new(polls),
            router,
            NegotiatorOptions {
                retry: RetryPolicy::immediate(),
                poll_error_delay: Duration::from_millis(5),
            },
        );
        Harness {
            negotiator,
            session,
            seed,
            caps_table,
            _packets: packets,
        }
    }

    fn caps(pairs: &[(&str, &str)]) -> SeedResult {
        Ok(pairs
            .iter()
            .map(|(name, uri)| (name.to_string(), uri.to_string()))
            .collect())
    }

    async fn wait_for_state(negotiator: &CapabilityNegotiator, expected: NegotiatorState) {
        let mut rx = negotiator.subscribe_state();
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if *rx.borrow_and_update() == expected {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;
        assert!(waited.is_ok(), "never reached {expected}, stuck in {}", negotiator.state());
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn start_requires_connected_session() {
        let h = harness(vec![], vec![]);
        h.session.connected.store(false, Ordering::SeqCst);

        assert!(!h.negotiator.start());
        settle().await;

        assert_eq!(h.negotiator.state(), NegotiatorState::Disconnected);
        assert_eq!(h.seed.calls(), 0);
    }

    #[tokio::test]
    async fn start_is_ignored_while_negotiating() {
        let h = harness(vec![], vec![]);

        assert!(h.negotiator.start());
        assert!(!h.negotiator.start());
        settle().await;

        assert_eq!(h.negotiator.state(), NegotiatorState::AwaitingSeedResponse);
        assert_eq!(h.seed.calls(), 1);
    }

    #[tokio::test]
    async fn seed_without_event_queue_is_active_without_stream() {
        let h = harness(vec![caps(&[("GetTexture", "https://sim.example.com/tex")])], vec![]);

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Active { event_stream_running: false }).await;

        assert_eq!(
            h.negotiator.capability_uri("GetTexture").map(|u| u.to_string()),
            Some("https://sim.example.com/tex".to_string())
        );
        assert_eq!(h.negotiator.capability_uri("EventQueueGet"), None);
        assert!(!h.negotiator.is_event_stream_running());
    }

    #[tokio::test]
    async fn event_queue_grant_starts_stream_and_routes_events() {
        let poll = Ok(PollResponse {
            id: Some(1),
            events: vec![CapsEvent::new(
                "ChatterBoxSessionStartReply",
                json!({
                    "session_id": "550e8400-e29b-41d4-a716-446655440000",
                    "temp_session_id": "550e8400-e29b-41d4-a716-446655440001",
                    "success": true
                }),
            )],
        });
        let h = harness(vec![caps(&[("EventQueueGet", "https://x/eq")])], vec![poll]);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler: Arc<dyn CapsEventHandler> = Arc::new(
            move |_: &str, _: &DecodedMessage, _: SessionId| -> Result<(), HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        h.caps_table.register(WILDCARD, handler);

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Active { event_stream_running: true }).await;
        settle().await;

        assert!(h.negotiator.is_event_stream_running());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(h.session.queue_connected.load(Ordering::SeqCst), 1);

        h.negotiator.disconnect(true);
    }

    #[tokio::test]
    async fn not_found_is_terminal() {
        let h = harness(vec![Err(SeedError::NotFound)], vec![]);

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Terminated).await;
        settle().await;

        assert_eq!(h.seed.calls(), 1);
        assert!(!h.negotiator.start());
    }

    #[tokio::test]
    async fn transient_failures_reissue_once_each() {
        let h = harness(
            vec![
                Err(SeedError::network("reset")),
                Err(SeedError::Timeout { timeout_secs: 60 }),
                Err(SeedError::malformed("not a map")),
                caps(&[("GetTexture", "https://sim.example.com/tex")]),
            ],
            vec![],
        );

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Active { event_stream_running: false }).await;

        assert_eq!(h.seed.calls(), 4);
    }

    #[tokio::test]
    async fn disconnect_abandons_pending_seed_request() {
        let h = harness(vec![], vec![]);

        h.negotiator.start();
        settle().await;
        h.negotiator.disconnect(true);
        settle().await;

        assert_eq!(h.negotiator.state(), NegotiatorState::Disconnected);
        assert_eq!(h.seed.calls(), 1);
    }

    #[tokio::test]
    async fn restart_replaces_capabilities() {
        let h = harness(
            vec![
                caps(&[("GetTexture", "https://a/tex"), ("GetMesh", "https://a/mesh")]),
                caps(&[("GetTexture", "https://b/tex")]),
            ],
            vec![],
        );
        let active = NegotiatorState::Active { event_stream_running: false };

        h.negotiator.start();
        wait_for_state(&h.negotiator, active).await;
        h.negotiator.disconnect(false);
        assert!(h.negotiator.capability_names().is_empty());

        h.negotiator.start();
        wait_for_state(&h.negotiator, active).await;

        assert_eq!(h.negotiator.capability_names(), vec!["GetTexture".to_string()]);
        assert_eq!(
            h.negotiator.capability_uri("GetTexture").map(|u| u.to_string()),
            Some("https://b/tex".to_string())
        );
        assert_eq!(h.negotiator.capability_uri("GetMesh"), None);
    }

    #[tokio::test]
    async fn queue_gone_marks_stream_stopped() {
        let h = harness(
            vec![caps(&[("EventQueueGet", "https://x/eq")])],
            vec![Err(PollError::NotFound)],
        );

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Active { event_stream_running: false }).await;

        assert!(!h.negotiator.is_event_stream_running());
        assert!(h.negotiator.capability_uri("EventQueueGet").is_some());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let h = harness(vec![Err(SeedError::NotFound)], vec![]);

        h.negotiator.disconnect(true);
        assert_eq!(h.negotiator.state(), NegotiatorState::Disconnected);

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Terminated).await;
        h.negotiator.disconnect(false);
        h.negotiator.disconnect(true);

        assert_eq!(h.negotiator.state(), NegotiatorState::Terminated);
    }

    #[tokio::test]
    async fn close_waits_for_stream() {
        let h = harness(vec![caps(&[("EventQueueGet", "https://x/eq")])], vec![]);

        h.negotiator.start();
        wait_for_state(&h.negotiator, NegotiatorState::Active { event_stream_running: true }).await;
        h.negotiator.close().await;

        assert_eq!(h.negotiator.state(), NegotiatorState::Disconnected);
        assert!(h.negotiator.capability_uri("EventQueueGet").is_none());
    }

    #[test]
    fn retry_policy_doubles_up_to_cap() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(50), Duration::ZERO);
    }
}
