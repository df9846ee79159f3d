//! EventStream - the continuously reconnecting long-poll loop.
//!
//! One stream is bound to one event-queue URI. Each completed poll is
//! acknowledged on the next request; events are handed to the listener in
//! arrival order.
//!
//! ## Stopping
//!
//! | Mode | In-flight poll | Closing request |
//! |------|----------------|-----------------|
//! | graceful | abandoned | sent, acking the last delivered batch |
//! | immediate | abandoned | not sent |
//!
//! Either way nothing reaches the listener's `on_event` once `stop`
//! returns, apart from a delivery already underway on another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::domain::messages::CapsEvent;
use crate::ports::{EventQueueTransport, PollRequest};

/// Why a stream loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called or the stream was dropped.
    Requested,
    /// The server no longer knows the queue.
    QueueGone,
}

/// Receiver for everything a stream produces.
pub trait EventStreamListener: Send + Sync {
    /// First poll completed; called once per stream.
    fn on_connected(&self);

    fn on_event(&self, event: CapsEvent);

    fn on_stopped(&self, reason: StopReason);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Run,
    Graceful,
    Immediate,
}

/// Handle to a running long-poll loop.
pub struct EventStream {
    signal: watch::Sender<Signal>,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl EventStream {
    /// Spawns the poll loop on the current runtime.
    ///
    /// Failed polls other than "queue gone" are retried after
    /// `error_delay`.
    pub fn start(
        uri: Url,
        transport: Arc<dyn EventQueueTransport>,
        listener: Arc<dyn EventStreamListener>,
        error_delay: Duration,
    ) -> Self {
        let (signal, signal_rx) = watch::channel(Signal::Run);
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(poll_loop(PollLoop {
            uri,
            transport,
            listener,
            error_delay,
            running: running.clone(),
            signal: signal_rx,
        }));

        Self {
            signal,
            running,
            task,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the loop to stop. Safe to call more than once; the first call
    /// decides the mode.
    pub fn stop(&self, immediate: bool) {
        self.running.store(false, Ordering::SeqCst);
        let requested = if immediate {
            Signal::Immediate
        } else {
            Signal::Graceful
        };
        self.signal.send_if_modified(|current| {
            if *current == Signal::Run {
                *current = requested;
                true
            } else {
                false
            }
        });
    }

    /// Waits for the loop to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Event stream task panicked");
            }
        }
    }
}

struct PollLoop {
    uri: Url,
    transport: Arc<dyn EventQueueTransport>,
    listener: Arc<dyn EventStreamListener>,
    error_delay: Duration,
    running: Arc<AtomicBool>,
    signal: watch::Receiver<Signal>,
}

async fn poll_loop(mut ctx: PollLoop) {
    let mut ack: Option<i64> = None;
    let mut connected = false;

    let reason = loop {
        if current_signal(&ctx.signal) != Signal::Run {
            break StopReason::Requested;
        }

        let result = tokio::select! {
            result = ctx.transport.poll(&ctx.uri, PollRequest::next(ack)) => result,
            _ = stop_requested(&mut ctx.signal) => break StopReason::Requested,
        };

        match result {
            Ok(response) => {
                if !connected && ctx.running.load(Ordering::SeqCst) {
                    connected = true;
                    tracing::debug!("Event queue connected");
                    ctx.listener.on_connected();
                }
                let mut delivered_all = true;
                for event in response.events {
                    if !ctx.running.load(Ordering::SeqCst) {
                        delivered_all = false;
                        break;
                    }
                    ctx.listener.on_event(event);
                }
                // A batch cut short by a stop stays unacknowledged.
                if delivered_all && response.id.is_some() {
                    ack = response.id;
                }
            }
            Err(e) if e.is_queue_gone() => {
                tracing::warn!(error = %e, "Event queue gone, stopping stream");
                break StopReason::QueueGone;
            }
            Err(e) => {
                tracing::debug!(error = %e, delay_ms = ctx.error_delay.as_millis() as u64, "Event queue poll failed");
                tokio::select! {
                    _ = tokio::time::sleep(ctx.error_delay) => {}
                    _ = stop_requested(&mut ctx.signal) => break StopReason::Requested,
                }
            }
        }
    };

    ctx.running.store(false, Ordering::SeqCst);

    if current_signal(&ctx.signal) == Signal::Graceful {
        if let Err(e) = ctx.transport.poll(&ctx.uri, PollRequest::closing(ack)).await {
            tracing::debug!(error = %e, "Closing poll failed");
        }
    }

    tracing::debug!(reason = ?reason, "Event stream stopped");
    ctx.listener.on_stopped(reason);
}

fn current_signal(signal: &watch::Receiver<Signal>) -> Signal {
    *signal.borrow()
}

/// Resolves once a stop is signalled or the handle is dropped.
async fn stop_requested(signal: &mut watch::Receiver<Signal>) {
    loop {
        if *signal.borrow_and_update() != Signal::Run {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PollError, PollResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    /// Transport that replays a script, then hangs like an idle queue.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<PollResponse, PollError>>>,
        requests: Mutex<Vec<PollRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<PollResponse, PollError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<PollRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl EventQueueTransport for ScriptedTransport {
        async fn poll(&self, _uri: &Url, request: PollRequest) -> Result<PollResponse, PollError> {
            self.requests.lock().push(request);
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None if request.done => Ok(PollResponse::empty()),
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Debug, PartialEq)]
    enum Note {
        Connected,
        Event(String),
        Stopped(StopReason),
    }

    struct ChannelListener {
        tx: mpsc::UnboundedSender<Note>,
    }

    impl EventStreamListener for ChannelListener {
        fn on_connected(&self) {
            let _ = self.tx.send(Note::Connected);
        }

        fn on_event(&self, event: CapsEvent) {
            let _ = self.tx.send(Note::Event(event.name));
        }

        fn on_stopped(&self, reason: StopReason) {
            let _ = self.tx.send(Note::Stopped(reason));
        }
    }

    fn listener() -> (Arc<ChannelListener>, mpsc::UnboundedReceiver<Note>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelListener { tx }), rx)
    }

    fn batch(id: i64, names: &[&str]) -> Result<PollResponse, PollError> {
        Ok(PollResponse {
            id: Some(id),
            events: names
                .iter()
                .map(|name| CapsEvent::new(*name, json!({})))
                .collect(),
        })
    }

    fn uri() -> Url {
        Url::parse("https://sim.example.com/eq").unwrap()
    }

    #[tokio::test]
    async fn delivers_events_in_order_and_acks_each_batch() {
        let transport = ScriptedTransport::new(vec![batch(1, &["A", "B"]), batch(2, &["C"])]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        assert_eq!(notes.recv().await, Some(Note::Connected));
        assert_eq!(notes.recv().await, Some(Note::Event("A".into())));
        assert_eq!(notes.recv().await, Some(Note::Event("B".into())));
        assert_eq!(notes.recv().await, Some(Note::Event("C".into())));

        stream.stop(true);
        stream.join().await;

        let requests = transport.requests();
        assert_eq!(requests[0], PollRequest::next(None));
        assert_eq!(requests[1], PollRequest::next(Some(1)));
        assert!(requests.iter().all(|r| !r.done));
        assert_eq!(notes.recv().await, Some(Note::Stopped(StopReason::Requested)));
    }

    #[tokio::test]
    async fn queue_gone_ends_stream() {
        let transport = ScriptedTransport::new(vec![Err(PollError::NotFound)]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        assert_eq!(notes.recv().await, Some(Note::Stopped(StopReason::QueueGone)));
        assert!(!stream.is_running());
        stream.join().await;
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(PollError::Http { status: 500 }),
            Err(PollError::Network("reset".into())),
            batch(1, &["A"]),
        ]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(5));

        assert_eq!(notes.recv().await, Some(Note::Connected));
        assert_eq!(notes.recv().await, Some(Note::Event("A".into())));
        assert!(stream.is_running());

        stream.stop(true);
        stream.join().await;
    }

    #[tokio::test]
    async fn graceful_stop_sends_closing_ack() {
        let transport = ScriptedTransport::new(vec![batch(5, &["A"])]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        assert_eq!(notes.recv().await, Some(Note::Connected));
        assert_eq!(notes.recv().await, Some(Note::Event("A".into())));

        stream.stop(false);
        assert!(!stream.is_running());
        stream.join().await;

        let requests = transport.requests();
        assert_eq!(requests.last(), Some(&PollRequest::closing(Some(5))));
        assert_eq!(notes.recv().await, Some(Note::Stopped(StopReason::Requested)));
    }

    #[tokio::test]
    async fn malformed_event_in_batch_still_advances_ack() {
        let mixed: PollResponse = serde_json::from_value(json!({
            "id": 1,
            "events": [
                {"message": "TeleportFinish", "body": {}},
                {"body": {"no": "name"}}
            ]
        }))
        .unwrap();
        let transport = ScriptedTransport::new(vec![Ok(mixed), batch(2, &["C"])]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        assert_eq!(notes.recv().await, Some(Note::Connected));
        assert_eq!(notes.recv().await, Some(Note::Event("TeleportFinish".into())));
        assert_eq!(notes.recv().await, Some(Note::Event("C".into())));

        stream.stop(true);
        stream.join().await;

        let requests = transport.requests();
        assert_eq!(requests[1], PollRequest::next(Some(1)));
    }

    /// Listener that parks inside `on_event` for "Halt" until released.
    struct GatedListener {
        tx: mpsc::UnboundedSender<Note>,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl EventStreamListener for GatedListener {
        fn on_connected(&self) {
            let _ = self.tx.send(Note::Connected);
        }

        fn on_event(&self, event: CapsEvent) {
            let halt = event.name == "Halt";
            let _ = self.tx.send(Note::Event(event.name));
            if halt {
                let _ = self.gate.lock().recv();
            }
        }

        fn on_stopped(&self, reason: StopReason) {
            let _ = self.tx.send(Note::Stopped(reason));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_mid_batch_leaves_batch_unacked() {
        let transport = ScriptedTransport::new(vec![batch(5, &["A"]), batch(6, &["Halt", "B"])]);
        let (tx, mut notes) = mpsc::unbounded_channel();
        let (release, gate) = std::sync::mpsc::channel();
        let listener = Arc::new(GatedListener {
            tx,
            gate: Mutex::new(gate),
        });
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        assert_eq!(notes.recv().await, Some(Note::Connected));
        assert_eq!(notes.recv().await, Some(Note::Event("A".into())));
        assert_eq!(notes.recv().await, Some(Note::Event("Halt".into())));

        stream.stop(false);
        release.send(()).unwrap();
        stream.join().await;

        assert_eq!(notes.recv().await, Some(Note::Stopped(StopReason::Requested)));
        let requests = transport.requests();
        assert_eq!(requests.last(), Some(&PollRequest::closing(Some(5))));
    }

    #[tokio::test]
    async fn immediate_stop_skips_closing_request() {
        let transport = ScriptedTransport::new(vec![]);
        let (listener, mut notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        tokio::task::yield_now().await;
        stream.stop(true);
        stream.join().await;

        assert!(transport.requests().iter().all(|r| !r.done));
        assert_eq!(notes.recv().await, Some(Note::Stopped(StopReason::Requested)));
    }

    #[tokio::test]
    async fn first_stop_mode_wins() {
        let transport = ScriptedTransport::new(vec![]);
        let (listener, _notes) = listener();
        let stream = EventStream::start(uri(), transport.clone(), listener, Duration::from_millis(10));

        stream.stop(true);
        stream.stop(false);
        stream.join().await;

        assert!(transport.requests().iter().all(|r| !r.done));
    }
}
