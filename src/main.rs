//! Probe binary: negotiates capabilities for one seed URI and logs every
//! event that arrives until interrupted.
//!
//! ```text
//! gridlink [SEED_URI]
//! ```
//!
//! Without an argument the seed URI comes from `GRIDLINK__SESSION__SEED_URI`.

use std::process::ExitCode;
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;

use gridlink::adapters::{ReqwestEventQueue, ReqwestSeedClient, TokioWorkerPool};
use gridlink::application::{
    CapabilityNegotiator, CapsDispatchTable, CapsEventRouter, EventDecoder, PacketDispatchTable,
    PacketPump, PacketQueue, WILDCARD,
};
use gridlink::config::{ClientConfig, ConfigError, ValidationError};
use gridlink::domain::capabilities::NegotiatorState;
use gridlink::domain::foundation::SessionId;
use gridlink::domain::messages::{DecodedMessage, Packet, PacketType};
use gridlink::ports::{HandlerError, SessionLink, WorkerPool};

#[derive(Debug, Error)]
enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("No seed URI given (argument or GRIDLINK__SESSION__SEED_URI)")]
    MissingSeedUri,

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker pool setup failed: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

/// Stand-in for a full network session: always connected, no packet
/// channel of its own.
struct ProbeSession {
    id: SessionId,
}

impl SessionLink for ProbeSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn event_queue_connected(&self) {
        tracing::info!(session_id = %self.id, "Event queue connected");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gridlink: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ProbeError> {
    let mut config = ClientConfig::load()?;
    if let Some(arg) = std::env::args().nth(1) {
        config.session.seed_uri = Some(SecretString::new(arg));
    }
    config.validate()?;
    config.logging.init_tracing()?;
    let seed_uri = config.session.seed_uri.take().ok_or(ProbeError::MissingSeedUri)?;

    let pool: Arc<dyn WorkerPool> =
        Arc::new(TokioWorkerPool::current(config.dispatch.worker_threads)?);
    let caps_table = Arc::new(CapsDispatchTable::with_worker_pool(Arc::clone(&pool)));
    let packet_table = Arc::new(
        PacketDispatchTable::new(pool).with_force_sync(config.dispatch.force_sync_packets),
    );

    caps_table.register(
        WILDCARD,
        Arc::new(
            |name: &str, message: &DecodedMessage, origin: SessionId| -> Result<(), HandlerError> {
                tracing::info!(session_id = %origin, event = name, ?message, "Capability event");
                Ok(())
            },
        ),
    );
    packet_table.register(
        PacketType::Default,
        Arc::new(|packet: &Packet, origin: SessionId| -> Result<(), HandlerError> {
            tracing::info!(session_id = %origin, packet_type = %packet.packet_type(), "Packet");
            Ok(())
        }),
        false,
    );

    let (queue, receiver) = PacketQueue::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = tokio::spawn(PacketPump::new(receiver, packet_table).run(shutdown_rx));

    let router = Arc::new(CapsEventRouter::new(
        EventDecoder::with_defaults(),
        caps_table,
        queue,
    ));
    let negotiator = CapabilityNegotiator::new(
        seed_uri,
        Arc::new(ProbeSession {
            id: SessionId::new(),
        }),
        Arc::new(ReqwestSeedClient::from_config(&config.caps)?),
        Arc::new(ReqwestEventQueue::from_config(&config.caps)?),
        router,
        config.caps.negotiator_options(),
    );

    let mut states = negotiator.subscribe_state();
    negotiator.start();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Interrupted, disconnecting");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::info!(%state, "Negotiator state");
                if state.is_active() {
                    tracing::info!(capabilities = ?negotiator.capability_names(), "Granted capabilities");
                }
                if state == NegotiatorState::Terminated {
                    break;
                }
            }
        }
    }

    negotiator.close().await;
    let _ = shutdown_tx.send(true);
    if let Err(e) = pump.await {
        tracing::error!(error = %e, "Packet pump task failed");
    }
    Ok(())
}
