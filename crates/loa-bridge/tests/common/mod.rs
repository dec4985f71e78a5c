#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use loa_bridge::{Bridge, BridgeConfig, DeviceLogger};
use loa_frame::SlipCodec;
use loa_message::{decode_message, Message, Value};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Records every call as `"<method> <text>"`.
#[derive(Default)]
pub struct CaptureLogger(Mutex<Vec<String>>);

impl CaptureLogger {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().expect("logger lock").clone()
    }

    fn push(&self, method: &str, text: &str) {
        self.0
            .lock()
            .expect("logger lock")
            .push(format!("{method} {text}"));
    }
}

impl DeviceLogger for CaptureLogger {
    fn print(&self, text: &str) {
        self.push("print", text);
    }
    fn info(&self, text: &str) {
        self.push("info", text);
    }
    fn warning(&self, text: &str) {
        self.push("warning", text);
    }
    fn error(&self, text: &str) {
        self.push("error", text);
    }
    fn success(&self, text: &str) {
        self.push("success", text);
    }
    fn dump(&self, text: &str) {
        self.push("dump", text);
    }
}

/// The device end of an in-memory connection, driven by the test.
pub struct ScriptedDevice {
    frames: FramedRead<ReadHalf<DuplexStream>, SlipCodec>,
    sink: FramedWrite<WriteHalf<DuplexStream>, SlipCodec>,
}

impl ScriptedDevice {
    pub async fn recv_frame(&mut self) -> Bytes {
        tokio::time::timeout(Duration::from_secs(5), self.frames.next())
            .await
            .expect("host should send a frame")
            .expect("stream should stay open")
            .expect("frame should decode")
            .into_packet()
            .expect("host frames should be well formed")
    }

    pub async fn recv_message(&mut self) -> Message {
        let frame = self.recv_frame().await;
        decode_message(&frame).expect("host frames should be messages")
    }

    /// Receive a request and return its id.
    pub async fn recv_request(&mut self, address: &str) -> (u16, Message) {
        let message = self.recv_message().await;
        assert_eq!(message.address, address);
        let id = message
            .arg(0)
            .and_then(Value::as_int)
            .expect("request should carry an id");
        (u16::try_from(id).expect("id should fit u16"), message)
    }

    pub async fn send(&mut self, address: &str, args: Vec<Value>) {
        let bytes = Message::new(address, args)
            .to_bytes()
            .expect("message should encode");
        self.sink.send(bytes).await.expect("device send");
    }

    pub async fn send_raw(&mut self, data: &[u8]) {
        self.sink
            .send(Bytes::copy_from_slice(data))
            .await
            .expect("device raw send");
    }

    /// Write bytes to the link as they are, without framing.
    pub async fn send_wire(&mut self, bytes: &[u8]) {
        let stream = self.sink.get_mut();
        stream.write_all(bytes).await.expect("device wire send");
        stream.flush().await.expect("device wire flush");
    }

    pub async fn respond(&mut self, id: u16, outcome: &str, payload: Value) {
        self.send(
            &format!("/response/{outcome}"),
            vec![Value::from(id), payload],
        )
        .await;
    }
}

pub struct Harness {
    pub bridge: Bridge,
    pub device: ScriptedDevice,
    pub logger: Arc<CaptureLogger>,
}

pub async fn connect(response_timeout: Duration) -> Harness {
    connect_with(BridgeConfig::default().with_response_timeout(response_timeout)).await
}

pub async fn connect_with(config: BridgeConfig) -> Harness {
    let logger = Arc::new(CaptureLogger::default());
    let bridge = Bridge::with_config(config, logger.clone()).expect("bridge should build");
    let device = attach(&bridge).await;
    Harness {
        bridge,
        device,
        logger,
    }
}

/// Attach `bridge` to a fresh in-memory link and return the device end.
pub async fn attach(bridge: &Bridge) -> ScriptedDevice {
    let (host, device) = tokio::io::duplex(64 * 1024);
    bridge.attach(host).await.expect("attach should succeed");

    let (read_half, write_half) = tokio::io::split(device);
    ScriptedDevice {
        frames: FramedRead::new(read_half, SlipCodec::new()),
        sink: FramedWrite::new(write_half, SlipCodec::new()),
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
