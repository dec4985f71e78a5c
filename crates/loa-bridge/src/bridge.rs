//! One device connection: its dispatch loop and the request API.
//!
//! Inbound frames are handled strictly in arrival order by a single task:
//!
//! ```text
//! transport ─► SlipCodec ─► ReceiveModeMachine ─┬─► decode_message ─► router.emit(address)
//!                                               └─► raw frame ───────► router.emit("/raw-data")
//! ```
//!
//! A frame the codec drops still counts as the frame armed for raw capture,
//! so an error never spills over onto the next frame.
//!
//! Outbound frames go through one writer behind an async mutex. Requests
//! suspend only their caller; the dispatch task keeps running underneath.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use loa_frame::{Decoded, SlipCodec};
use loa_message::{decode_message, Message, Value};
#[cfg(unix)]
use loa_transport::{DeviceStream, TransportConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::address::{RAW_ANY, RAW_DATA, RAW_RESPONSE, RESPONSE, SUCCESS};
use crate::config::BridgeConfig;
use crate::correlator::RequestCorrelator;
use crate::error::{BridgeError, Result};
use crate::event::Event;
use crate::lock;
use crate::logger::{trim_line_break, DeviceLogger};
use crate::mode::{Inbound, ReceiveMode, ReceiveModeMachine};
use crate::pattern::Params;
use crate::router::{HandlerId, PatternRouter};

type FrameSink = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, SlipCodec>;

/// A request/response connection to one device.
///
/// Cloning is cheap; clones share the connection. Dropping the last clone
/// stops the dispatch task.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

struct Shared {
    config: BridgeConfig,
    router: PatternRouter<Event>,
    correlator: RequestCorrelator,
    mode: Arc<ReceiveModeMachine>,
    logger: Arc<dyn DeviceLogger>,
    writer: AsyncMutex<Option<FrameSink>>,
    connected: watch::Sender<bool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a disconnected bridge with default configuration.
    pub fn new(logger: Arc<dyn DeviceLogger>) -> Result<Self> {
        Self::with_config(BridgeConfig::default(), logger)
    }

    /// Create a disconnected bridge.
    ///
    /// Installs the protocol handlers: `/raw/**` arms raw capture, and
    /// `/response/:outcome`, `/raw/response/:outcome` and `/raw-data` feed the
    /// request correlator.
    pub fn with_config(config: BridgeConfig, logger: Arc<dyn DeviceLogger>) -> Result<Self> {
        let router = PatternRouter::new();
        let correlator = RequestCorrelator::new(config.response_timeout);
        let mode = Arc::new(ReceiveModeMachine::new());

        let armed = Arc::clone(&mode);
        router.on(RAW_ANY, move |_, _| armed.arm())?;

        let inline = correlator.clone();
        router.on(RESPONSE, move |event, params| {
            route_response(&inline, event, params, false)
        })?;

        let raw = correlator.clone();
        router.on(RAW_RESPONSE, move |event, params| {
            route_response(&raw, event, params, true)
        })?;

        let capture = correlator.clone();
        router.on(RAW_DATA, move |event, _| match event {
            Event::RawData(data) => {
                capture.on_raw_data(data.clone());
            }
            Event::RawLost(reason) => {
                capture.on_raw_lost(reason);
            }
            Event::Message(_) => {}
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                router,
                correlator,
                mode,
                logger,
                writer: AsyncMutex::new(None),
                connected: watch::Sender::new(false),
                dispatch: Mutex::new(None),
            }),
        })
    }

    /// Open the device described by `transport` and start dispatching.
    #[cfg(unix)]
    pub async fn connect(&self, transport: &TransportConfig) -> Result<()> {
        if self.is_connected() {
            return Err(BridgeError::AlreadyConnected);
        }
        let stream = DeviceStream::open(transport).await?;
        info!(
            path = %transport.path.display(),
            baud_rate = transport.baud_rate,
            kind = stream.kind(),
            "connected to device"
        );
        self.attach(stream).await
    }

    /// Use an already open byte stream as the device connection.
    pub async fn attach<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut writer = self.shared.writer.lock().await;
        if writer.is_some() {
            return Err(BridgeError::AlreadyConnected);
        }

        self.shared.mode.reset();
        let (read_half, write_half) = tokio::io::split(stream);
        let sink: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        *writer = Some(FramedWrite::new(
            sink,
            SlipCodec::with_config(self.shared.config.frame_config()),
        ));
        let frames = FramedRead::new(
            read_half,
            SlipCodec::with_config(self.shared.config.frame_config()),
        );

        let dispatcher = Dispatcher {
            router: self.shared.router.clone(),
            mode: Arc::clone(&self.shared.mode),
            logger: Arc::clone(&self.shared.logger),
        };
        self.shared.connected.send_replace(true);
        let task = tokio::spawn(run_dispatch(
            frames,
            dispatcher,
            Arc::downgrade(&self.shared),
        ));
        if let Some(previous) = lock(&self.shared.dispatch).replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Close the connection and reject every pending request.
    ///
    /// Closing a bridge that is not connected does nothing.
    pub async fn close(&self) -> Result<()> {
        let task = lock(&self.shared.dispatch).take();
        if let Some(task) = task {
            task.abort();
        }
        let sink = self.shared.writer.lock().await.take();
        self.shared.connected.send_replace(false);
        self.shared.mode.reset();
        let rejected = self.shared.correlator.reject_all("connection closed");

        if let Some(mut sink) = sink {
            SinkExt::<Bytes>::close(&mut sink).await?;
            info!(rejected, "connection closed");
        }
        Ok(())
    }

    /// Write one raw frame.
    pub async fn send_raw(&self, data: impl Into<Bytes>) -> Result<()> {
        self.write_frames(vec![data.into()]).await
    }

    /// Send `address` with the next request id prepended to `args`.
    ///
    /// Does not wait for a response. Returns the id used.
    pub async fn send_message(&self, address: &str, args: Vec<Value>) -> Result<u16> {
        let id = self.shared.correlator.next_id();
        let frame = encode_request(address, id, args)?;
        self.write_frames(vec![frame]).await?;
        debug!(id, address, "message sent");
        Ok(id)
    }

    /// Send a request and wait for its correlated response payload.
    pub async fn send_request(&self, address: &str, args: Vec<Value>) -> Result<Value> {
        self.request(address, args, None).await
    }

    /// Send a request immediately followed by a raw frame, then wait for the
    /// correlated response. No other frame is written between the two.
    pub async fn send_raw_request(
        &self,
        address: &str,
        args: Vec<Value>,
        data: impl Into<Bytes>,
    ) -> Result<Value> {
        self.request(address, args, Some(data.into())).await
    }

    /// Wait for the next event matching `pattern`, up to the response timeout.
    pub async fn wait_for_message(&self, pattern: &str) -> Result<Event> {
        self.wait_for_message_within(pattern, self.shared.config.response_timeout)
            .await
    }

    /// Wait for the next event matching `pattern`, up to `timeout`.
    pub async fn wait_for_message_within(&self, pattern: &str, timeout: Duration) -> Result<Event> {
        let (tx, rx) = oneshot::channel();
        let id = self.shared.router.once(pattern, move |event: &Event, _: &Params| {
            let _ = tx.send(event.clone());
        })?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(BridgeError::Disconnected("router dropped".into())),
            Err(_) => {
                self.shared.router.off(pattern, id);
                Err(BridgeError::Timeout(timeout))
            }
        }
    }

    /// Subscribe to events matching `pattern`.
    pub fn on<F>(&self, pattern: &str, handler: F) -> Result<HandlerId>
    where
        F: Fn(&Event, &Params) + Send + Sync + 'static,
    {
        Ok(self.shared.router.on(pattern, handler)?)
    }

    /// Subscribe to the next event matching `pattern`.
    pub fn once<F>(&self, pattern: &str, handler: F) -> Result<HandlerId>
    where
        F: FnOnce(&Event, &Params) + Send + 'static,
    {
        Ok(self.shared.router.once(pattern, handler)?)
    }

    /// Remove a handler added with [`on`](Self::on) or [`once`](Self::once).
    pub fn off(&self, pattern: &str, id: HandlerId) -> bool {
        self.shared.router.off(pattern, id)
    }

    /// The router inbound events are emitted on.
    pub fn router(&self) -> &PatternRouter<Event> {
        &self.shared.router
    }

    /// Where device output goes.
    pub fn logger(&self) -> Arc<dyn DeviceLogger> {
        Arc::clone(&self.shared.logger)
    }

    /// Configuration this bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// How the next inbound frame will be interpreted.
    pub fn receive_mode(&self) -> ReceiveMode {
        self.shared.mode.mode()
    }

    /// Whether a connection is attached and still open.
    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Resolve once the bridge is not connected, by `close` or by the
    /// device going away.
    pub async fn disconnected(&self) {
        let mut state = self.shared.connected.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = state.wait_for(|connected| !*connected).await;
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    async fn request(&self, address: &str, args: Vec<Value>, raw: Option<Bytes>) -> Result<Value> {
        let correlator = &self.shared.correlator;
        let id = correlator.next_id();
        let mut frames = vec![encode_request(address, id, args)?];
        frames.extend(raw);

        let pending = correlator.register(id);
        if let Err(err) = self.write_frames(frames).await {
            correlator.cancel(id);
            return Err(err);
        }
        debug!(id, address, "request sent");
        pending.await
    }

    async fn write_frames(&self, frames: Vec<Bytes>) -> Result<()> {
        let mut writer = self.shared.writer.lock().await;
        let sink = writer.as_mut().ok_or(BridgeError::NotConnected)?;
        for frame in frames {
            sink.feed(frame).await?;
        }
        SinkExt::<Bytes>::flush(sink).await?;
        Ok(())
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("connected", &self.is_connected())
            .field("mode", &self.receive_mode())
            .field("pending", &self.pending_requests())
            .finish()
    }
}

impl Shared {
    async fn on_disconnect(&self, reason: &str) {
        self.connected.send_replace(false);
        self.mode.reset();
        let rejected = self.correlator.reject_all(reason);
        self.writer.lock().await.take();
        warn!(reason, rejected, "device disconnected");
        self.logger.error("disconnected");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let task = self
            .dispatch
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

struct Dispatcher {
    router: PatternRouter<Event>,
    mode: Arc<ReceiveModeMachine>,
    logger: Arc<dyn DeviceLogger>,
}

impl Dispatcher {
    fn dispatch(&self, item: Decoded) {
        let packet = match item {
            Decoded::Packet(packet) => packet,
            Decoded::Dropped(err) => {
                if self.mode.discard() {
                    let event = Event::RawLost(err.to_string());
                    self.router.emit(event.address(), &event);
                }
                return;
            }
        };

        match self.mode.classify(packet) {
            Inbound::Raw(data) => {
                trace!(len = data.len(), "raw frame");
                let event = Event::RawData(data);
                self.router.emit(event.address(), &event);
            }
            Inbound::Structured(packet) if packet.is_empty() => {
                trace!("empty frame outside raw capture");
            }
            Inbound::Structured(packet) => match decode_message(&packet) {
                Ok(message) => {
                    trace!(address = %message.address, args = message.args.len(), "message");
                    let event = Event::Message(message);
                    self.router.emit(event.address(), &event);
                }
                Err(err) => {
                    debug!(error = %err, len = packet.len(), "frame is not a message, printing as text");
                    let text = String::from_utf8_lossy(&packet);
                    self.logger.print(trim_line_break(&text));
                }
            },
        }
    }
}

async fn run_dispatch<R>(
    mut frames: FramedRead<R, SlipCodec>,
    dispatcher: Dispatcher,
    shared: Weak<Shared>,
) where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match frames.next().await {
            Some(Ok(item)) => dispatcher.dispatch(item),
            Some(Err(err)) => break err.to_string(),
            None => break "end of stream".to_string(),
        }
    };
    if let Some(shared) = shared.upgrade() {
        shared.on_disconnect(&reason).await;
    }
}

fn route_response(correlator: &RequestCorrelator, event: &Event, params: &Params, raw: bool) {
    let id = event
        .args()
        .first()
        .and_then(Value::as_int)
        .and_then(|id| u16::try_from(id).ok());
    let Some(id) = id else {
        warn!(address = event.address(), "response without a valid request id");
        return;
    };

    let success = params.get("outcome") == Some(SUCCESS);
    if raw {
        correlator.on_raw_response(id, success);
    } else {
        let payload = event.args().get(1).cloned().unwrap_or(Value::Nil);
        correlator.on_response(id, success, payload);
    }
}

fn encode_request(address: &str, id: u16, args: Vec<Value>) -> Result<Bytes> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(Value::from(id));
    full.extend(args);
    Ok(Message::new(address, full).to_bytes()?)
}
