#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use loa_frame::{PacketReader, PacketWriter};
use loa_message::{decode_message, Message, Value};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/loacli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// What the simulated board saw during one CLI invocation.
#[derive(Debug, Default)]
struct Seen {
    requests: Vec<Message>,
    raw: Vec<Vec<u8>>,
}

/// Accept one connection on `sock` and answer requests until the host hangs up.
fn spawn_board(sock: &PathBuf) -> (JoinHandle<()>, mpsc::Receiver<Seen>) {
    let listener = UnixListener::bind(sock).expect("socket should bind");
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("host should connect");
        let mut reader = PacketReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = PacketWriter::new(stream);
        let mut seen = Seen::default();

        while let Ok(packet) = reader.read_packet() {
            let Ok(message) = decode_message(&packet) else {
                seen.raw.push(packet.to_vec());
                continue;
            };
            let id = message.arg(0).cloned().expect("request should carry an id");
            let reply = match message.address.as_str() {
                "/list-dir" => Message::new(
                    "/response/success",
                    vec![id, Value::from(r#"["init.lua",["lib",["util.lua"]]]"#)],
                ),
                "/write-file" => {
                    let content = reader.read_packet().expect("content frame should follow");
                    seen.raw.push(content.to_vec());
                    Message::new("/response/success", vec![id, Value::Bool(true)])
                }
                "/delete-file" => Message::new(
                    "/response/failure",
                    vec![id, Value::from("no such file")],
                ),
                "/echo" => Message::new(
                    "/response/success",
                    vec![id, message.arg(1).cloned().unwrap_or(Value::Nil)],
                ),
                _ => Message::new("/response/failure", vec![id, Value::from("unknown")]),
            };
            seen.requests.push(message);
            let bytes = reply.to_bytes().expect("reply should encode");
            writer.send(&bytes).expect("reply should send");
        }
        let _ = tx.send(seen);
    });
    (handle, rx)
}

fn loa(sock: &PathBuf, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_loa"))
        .env_remove("LOA_DEVICE")
        .arg("--log-level")
        .arg("error")
        .arg("--device")
        .arg(sock)
        .args(args)
        .output()
        .expect("loa should run")
}

#[test]
fn ls_prints_listing_as_json() {
    let dir = unique_temp_dir("ls");
    let sock = dir.join("board.sock");
    let (board, seen) = spawn_board(&sock);

    let output = loa(&sock, &["--format", "json", "ls", "/"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let listing: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be json");
    assert_eq!(listing, serde_json::json!(["init.lua", ["lib", ["util.lua"]]]));

    board.join().expect("board thread");
    let seen = seen.recv().expect("board should report");
    assert_eq!(seen.requests[0].address, "/list-dir");
    assert_eq!(seen.requests[0].arg(1), Some(&Value::from("/")));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn write_uploads_local_file() {
    let dir = unique_temp_dir("write");
    let sock = dir.join("board.sock");
    let local = dir.join("blink.lua");
    std::fs::write(&local, b"print('blink')").expect("local file should be writable");
    let (board, seen) = spawn_board(&sock);

    let output = loa(
        &sock,
        &["--format", "json", "write", local.to_str().expect("utf-8 path"), "/lua/blink.lua"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"ok\":true"));
    assert!(stdout.contains("\"bytes\":14"));

    board.join().expect("board thread");
    let seen = seen.recv().expect("board should report");
    assert_eq!(
        seen.requests[0].args[1..],
        [Value::from("/lua"), Value::from("blink.lua")]
    );
    assert_eq!(seen.raw, vec![b"print('blink')".to_vec()]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_prints_response_payload() {
    let dir = unique_temp_dir("send");
    let sock = dir.join("board.sock");
    let (board, _seen) = spawn_board(&sock);

    let output = loa(&sock, &["--format", "json", "send", "/echo", "42"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let response: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be json");
    assert_eq!(response["address"], "/echo");
    assert_eq!(response["result"], 42);

    board.join().expect("board thread");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn device_failure_returns_4() {
    let dir = unique_temp_dir("rm");
    let sock = dir.join("board.sock");
    let (board, _seen) = spawn_board(&sock);

    let output = loa(&sock, &["rm", "/missing.lua"]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no such file"));

    board.join().expect("board thread");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_device_returns_3() {
    let missing = PathBuf::from(format!("/tmp/loacli-missing-{}.sock", std::process::id()));
    let output = loa(&missing, &["ls"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn no_device_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_loa"))
        .env_remove("LOA_DEVICE")
        .arg("ls")
        .output()
        .expect("loa should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_needs_no_device() {
    let output = Command::new(env!("CARGO_BIN_EXE_loa"))
        .env_remove("LOA_DEVICE")
        .arg("version")
        .output()
        .expect("loa should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("loa "));
}
