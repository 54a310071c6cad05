//! The device worker: dial, capabilities handshake, subscribe, receive
//! loop, reconnect with backoff and session-TTL teardown.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Request, Streaming};
use tracing::{debug, error, info, warn};

use gnmipulse_exporter::Exporter;

use crate::config::{ClientConfig, ForcedEncoding};
use crate::gnmi::{self, g_nmi_client::GNmiClient};
use crate::monitor::{ClientMonitor, SR_BUFFER_SIZE};
use crate::router::{GnmiPlugin, Router};
use crate::subscribe::build_subscription_list;

const TIMEOUT_MULTIPLIER: u32 = 3;
const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(300);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(120);
/// Pause between a session-TTL teardown and the redial.
const TTL_REDIAL_PAUSE: Duration = Duration::from_millis(100);
pub const DEFAULT_OVERSAMPLING: i64 = 2;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("plugin {0} is already registered")]
    PluginAlreadyRegistered(String),
    #[error("subscription path {new} overlaps already registered path {existing}")]
    AmbiguousPath { new: String, existing: String },
    #[error("the yang model <{model}> is not supported by {device}")]
    UnsupportedModel { model: String, device: String },
    #[error("credentials contain characters not representable in request metadata")]
    InvalidCredentials,
    #[error("dial timed out")]
    DialTimeout,
    #[error("capabilities request timed out")]
    CapabilitiesTimeout,
    #[error("cannot load TLS material: {0}")]
    TlsMaterial(#[from] std::io::Error),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Rpc(#[from] tonic::Status),
    #[error(transparent)]
    Registration(#[from] gnmipulse_exporter::ExporterError),
}

/// Connection supervision states of a device worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Dialing,
    CheckingCaps,
    Subscribing,
    Streaming,
    Backoff,
    Stopped,
}

struct Shared {
    config: ClientConfig,
    monitor: Arc<ClientMonitor>,
    router: RwLock<Router>,
    state: Mutex<WorkerState>,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
        debug!(device = %self.config.device_name, state = ?state, "worker state");
    }
}

/// Supervises the gNMI session to one device.
pub struct GnmiClient {
    shared: Arc<Shared>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GnmiClient {
    /// Creates the worker and registers its health monitor with the
    /// exporter.
    pub fn new(config: ClientConfig, exporter: &Exporter) -> Result<Self, ClientError> {
        let monitor = Arc::new(ClientMonitor::new(&config.device_name));
        exporter.register(monitor.clone(), &ClientMonitor::descriptors())?;
        let router = Router::new(config.vendor, monitor.clone());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                monitor,
                router: RwLock::new(router),
                state: Mutex::new(WorkerState::Idle),
            }),
            token: CancellationToken::new(),
            task: None,
        })
    }

    /// Registers a plugin for this device. Must happen before
    /// [`GnmiClient::start`].
    pub fn register_plugin(
        &self,
        name: &str,
        plugin: Arc<dyn GnmiPlugin>,
    ) -> Result<(), ClientError> {
        self.shared.router.write().register_plugin(name, plugin)
    }

    /// Spawns the worker task. Non-blocking.
    pub fn start(&mut self) {
        let shared = self.shared.clone();
        let token = self.token.clone();
        self.task = Some(tokio::spawn(run(shared, token)));
    }

    /// Cancels the worker and waits for it to wind down.
    pub async fn close(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    pub fn device_name(&self) -> &str {
        &self.shared.config.device_name
    }
}

/// How the receive loop ended.
enum StreamEnd {
    /// The device closed the stream.
    Closed,
    /// The stream failed.
    Error(tonic::Status),
    /// Cancelled: parent shutdown or session-TTL expiry.
    Cancelled,
}

async fn run(shared: Arc<Shared>, token: CancellationToken) {
    let device = shared.config.device_name.clone();
    let call_timeout = call_timeout(shared.config.scrape_interval);
    let oversampling = normalize_oversampling(shared.config.oversampling, &device);
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if token.is_cancelled() {
            break;
        }

        // Dial
        shared.set_state(WorkerState::Dialing);
        info!(device = %device, "dialing");
        let channel = match connect(&shared.config, call_timeout).await {
            Ok(channel) => channel,
            Err(e) => {
                info!(device = %device, error = %e, "dial failed");
                shared.monitor.inc_dial_errors();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, backoff).await {
                    break;
                }
                backoff = grow(backoff);
                continue;
            }
        };
        let mut stub = GNmiClient::new(channel).max_decoding_message_size(usize::MAX);

        // Check capabilities
        shared.set_state(WorkerState::CheckingCaps);
        info!(device = %device, "checking capabilities");
        let encoding = match check_capabilities(&shared, &mut stub, call_timeout).await {
            Ok(encoding) => encoding,
            Err(e) => {
                info!(device = %device, error = %e, "capabilities check failed");
                shared.monitor.inc_capabilities_errors();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, backoff).await {
                    break;
                }
                backoff = grow(backoff);
                continue;
            }
        };

        // Subscribe
        shared.set_state(WorkerState::Subscribing);
        info!(device = %device, "subscribing gNMI telemetries");
        let stream = match open_subscription(&shared, &mut stub, encoding, oversampling).await {
            Ok(stream) => stream,
            Err(e) => {
                info!(device = %device, error = %e, "subscribe failed");
                shared.monitor.inc_subscribe_errors();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, backoff).await {
                    break;
                }
                backoff = grow(backoff);
                continue;
            }
        };

        // Receive (blocking until teardown)
        shared.set_state(WorkerState::Streaming);
        info!(device = %device, "device is now online");
        backoff = INITIAL_BACKOFF;

        let session = token.child_token();
        let ttl_timer = shared.config.max_life.map(|max_life| {
            let session = session.clone();
            tokio::spawn(async move {
                tokio::time::sleep(max_life).await;
                session.cancel();
            })
        });

        let outcome = receive(&shared, stream, &session).await;
        if let Some(timer) = ttl_timer {
            timer.abort();
        }

        // Whatever ended the stream, cached plugin state is no longer
        // trustworthy.
        shared.router.read().broadcast_sync(false);

        match outcome {
            StreamEnd::Error(status) => {
                error!(device = %device, error = %status, "stream receive error");
                shared.monitor.inc_disconnections();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, backoff).await {
                    break;
                }
                backoff = grow(backoff);
            }
            StreamEnd::Closed => {
                warn!(device = %device, "stream closed by device");
                shared.monitor.inc_disconnections();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, backoff).await {
                    break;
                }
                backoff = grow(backoff);
            }
            StreamEnd::Cancelled => {
                if token.is_cancelled() {
                    break;
                }
                // Session TTL expiry: flush and redial right away.
                info!(device = %device, "session TTL expired, reconnecting");
                shared.monitor.inc_disconnections();
                shared.set_state(WorkerState::Backoff);
                if !pause(&token, TTL_REDIAL_PAUSE).await {
                    break;
                }
            }
        }
    }

    shared.set_state(WorkerState::Stopped);
    info!(device = %device, "worker stopped");
}

/// Deadline applied to the dial and capabilities calls. The long-lived
/// subscribe stream is bounded only by the worker's cancellation token.
fn call_timeout(scrape_interval: Duration) -> Duration {
    scrape_interval
        .checked_mul(TIMEOUT_MULTIPLIER)
        .unwrap_or(MAX_CALL_TIMEOUT)
        .min(MAX_CALL_TIMEOUT)
}

fn grow(backoff: Duration) -> Duration {
    (backoff * 2).min(MAX_BACKOFF)
}

/// Sleeps unless the token fires first. Returns false on cancellation.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn normalize_oversampling(value: i64, device: &str) -> i64 {
    if value == 0 {
        return DEFAULT_OVERSAMPLING;
    }
    if !(1..=10).contains(&value) {
        warn!(device = %device, "oversampling must fall between 1 and 10");
        return DEFAULT_OVERSAMPLING;
    }
    value
}

async fn connect(config: &ClientConfig, timeout: Duration) -> Result<Channel, ClientError> {
    let mut endpoint = Endpoint::from_shared(config.endpoint_uri())?.connect_timeout(timeout);

    if config.tls.enabled {
        let mut tls = ClientTlsConfig::new();
        if config.tls.insecure_skip_verify {
            warn!(device = %config.device_name, "TLS verification disabled - not recommended for production");
        }
        if let Some(ca_path) = &config.tls.ca_cert {
            let ca = tokio::fs::read(ca_path).await?;
            tls = tls.ca_certificate(Certificate::from_pem(ca));
        }
        if let (Some(cert_path), Some(key_path)) =
            (&config.tls.client_cert, &config.tls.client_key)
        {
            let cert = tokio::fs::read(cert_path).await?;
            let key = tokio::fs::read(key_path).await?;
            tls = tls.identity(Identity::from_pem(cert, key));
        }
        endpoint = endpoint.tls_config(tls)?;
    }

    let channel = tokio::time::timeout(timeout, endpoint.connect())
        .await
        .map_err(|_| ClientError::DialTimeout)??;
    Ok(channel)
}

/// Attaches the per-RPC credential metadata when configured.
fn with_credentials<T>(
    mut request: Request<T>,
    config: &ClientConfig,
) -> Result<Request<T>, ClientError> {
    if let Some(creds) = &config.credentials {
        let username = creds
            .username
            .parse()
            .map_err(|_| ClientError::InvalidCredentials)?;
        let password = creds
            .password
            .parse()
            .map_err(|_| ClientError::InvalidCredentials)?;
        request.metadata_mut().insert("username", username);
        request.metadata_mut().insert("password", password);
    }
    Ok(request)
}

/// Verifies the device advertises every YANG model the plugins need and
/// settles the notification encoding. The timeout applies to this call
/// only.
async fn check_capabilities(
    shared: &Shared,
    stub: &mut GNmiClient<Channel>,
    timeout: Duration,
) -> Result<gnmi::Encoding, ClientError> {
    let request = with_credentials(
        Request::new(gnmi::CapabilityRequest::default()),
        &shared.config,
    )?;
    let caps = tokio::time::timeout(timeout, stub.capabilities(request))
        .await
        .map_err(|_| ClientError::CapabilitiesTimeout)??
        .into_inner();

    let supported: HashSet<&str> = caps
        .supported_models
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    for model in shared.router.read().required_models() {
        if !supported.contains(model.as_str()) {
            return Err(ClientError::UnsupportedModel {
                model,
                device: shared.config.device_name.clone(),
            });
        }
    }

    Ok(select_encoding(
        shared.config.force_encoding,
        &caps.supported_encodings,
    ))
}

/// Forced encoding wins; otherwise the first encoding advertised by the
/// server is used, falling back to PROTO when the device advertises
/// none.
fn select_encoding(force: Option<ForcedEncoding>, advertised: &[i32]) -> gnmi::Encoding {
    if let Some(forced) = force {
        return forced.to_proto();
    }
    advertised
        .first()
        .and_then(|raw| gnmi::Encoding::try_from(*raw).ok())
        .unwrap_or(gnmi::Encoding::Proto)
}

async fn open_subscription(
    shared: &Shared,
    stub: &mut GNmiClient<Channel>,
    encoding: gnmi::Encoding,
    oversampling: i64,
) -> Result<Streaming<gnmi::SubscribeResponse>, ClientError> {
    let subscribe_request = {
        let router = shared.router.read();
        gnmi::SubscribeRequest {
            request: Some(gnmi::subscribe_request::Request::Subscribe(
                build_subscription_list(&shared.config, &router, encoding, oversampling),
            )),
            extension: vec![],
        }
    };

    let request = with_credentials(
        Request::new(tokio_stream::once(subscribe_request)),
        &shared.config,
    )?;
    let response = stub.subscribe(request).await?;
    Ok(response.into_inner())
}

/// Drains the subscribe stream through a bounded channel. A reader task
/// feeds the channel and records its peak depth; the main loop routes.
async fn receive(
    shared: &Arc<Shared>,
    mut stream: Streaming<gnmi::SubscribeResponse>,
    session: &CancellationToken,
) -> StreamEnd {
    let (tx, mut rx) = mpsc::channel::<gnmi::SubscribeResponse>(SR_BUFFER_SIZE);
    let monitor = shared.monitor.clone();

    let reader: JoinHandle<StreamEnd> = tokio::spawn(async move {
        loop {
            match stream.message().await {
                Ok(Some(sr)) => {
                    if tx.send(sr).await.is_err() {
                        return StreamEnd::Cancelled;
                    }
                    monitor.observe_buf_len(SR_BUFFER_SIZE - tx.capacity());
                }
                Ok(None) => return StreamEnd::Closed,
                Err(status) => return StreamEnd::Error(status),
            }
        }
    });

    loop {
        tokio::select! {
            _ = session.cancelled() => {
                reader.abort();
                return StreamEnd::Cancelled;
            }
            msg = rx.recv() => match msg {
                Some(sr) => shared.router.read().route(sr),
                None => break,
            }
        }
    }

    match reader.await {
        Ok(end) => end,
        Err(_) => StreamEnd::Closed,
    }
}
