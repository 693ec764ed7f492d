//! Integration tests for DeviceLink and RelayController against a fake
//! terminal listening on localhost.

use biogate_core::{DeviceSettings, constants::FRAME_OVERHEAD};
use biogate_network::{DeviceLink, LinkConfig, LinkState, RelayController};
use biogate_protocol::{CommandCode, Response, decode, encode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const T0: u32 = 1_700_000_000;

fn fast_config() -> LinkConfig {
    LinkConfig {
        connect_timeout: Duration::from_millis(500),
        idle_timeout: Duration::from_secs(2),
        log_fetch_timeout: Duration::from_millis(300),
        relay_ack_timeout: Duration::from_millis(300),
    }
}

async fn terminal() -> (TcpListener, DeviceSettings) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, DeviceSettings::new("127.0.0.1").port(port))
}

fn record(ts: u32, user: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&ts.to_le_bytes());
    out.extend_from_slice(&user.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out
}

fn reply(command: CommandCode) -> Vec<u8> {
    encode(command.code(), &[], 0).to_vec()
}

/// Read the next request frame. Requests carry no payload except relay
/// control, which carries two bytes.
async fn next_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Option<Response> {
    loop {
        if pending.len() >= 6 {
            let command = u32::from_le_bytes([pending[2], pending[3], pending[4], pending[5]]);
            let len = if command == CommandCode::RelayControl.code() {
                FRAME_OVERHEAD + 2
            } else {
                FRAME_OVERHEAD
            };
            if pending.len() >= len {
                let frame: Vec<u8> = pending.drain(..len).collect();
                return decode(&frame);
            }
        }

        let mut chunk = [0u8; 256];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
        }
    }
}

#[tokio::test]
async fn test_connect_sends_connect_command() {
    let (listener, settings) = terminal().await;
    let settings = settings.comm_key(77);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap()
    });

    let link = DeviceLink::new(fast_config());
    let mut states = link.subscribe();

    assert!(link.connect(&settings).await);
    assert!(link.is_connected());
    assert_eq!(*states.borrow_and_update(), LinkState::Connected);

    let hello = server.await.unwrap();
    assert_eq!(hello.command, CommandCode::Connect.code());
    assert_eq!(hello.comm_key, 77);
    assert!(hello.success);
}

/// No listener: connect resolves false and a later fetch is simply empty.
#[tokio::test]
async fn test_connect_refused_then_fetch_is_empty() {
    let (listener, settings) = terminal().await;
    drop(listener);

    let link = DeviceLink::new(LinkConfig::default());
    let started = Instant::now();

    assert!(!link.connect(&settings).await);
    assert!(started.elapsed() < Duration::from_millis(3500));
    assert_eq!(link.state(), LinkState::Disconnected);

    let records = link.fetch_scan_logs(&settings).await;
    assert!(records.is_empty());
}

/// Unroutable address (RFC 5737 TEST-NET-1): the attempt is cancelled at the
/// connect timeout.
#[tokio::test]
async fn test_connect_timeout() {
    let settings = DeviceSettings::new("192.0.2.1").port(9999);
    let config = LinkConfig {
        connect_timeout: Duration::from_millis(100),
        ..LinkConfig::default()
    };
    let link = DeviceLink::new(config);

    let started = Instant::now();
    assert!(!link.connect(&settings).await);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_reconnect_tears_down_previous_session() {
    let (listener, settings) = terminal().await;

    let server = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut first, &mut pending).await.unwrap();

        let (mut second, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut second, &mut pending).await.unwrap();

        // The first socket must have been closed by the client.
        let mut buf = [0u8; 1];
        timeout(Duration::from_secs(1), first.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0)
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.connect(&settings).await);
    assert!(link.connect(&settings).await);

    assert_eq!(server.await.unwrap(), 0);
    assert!(link.is_connected());
}

#[tokio::test]
async fn test_ensure_connected_reuses_session() {
    let (listener, settings) = terminal().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();

        let second = timeout(Duration::from_millis(300), listener.accept()).await;
        second.is_err()
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.ensure_connected(&settings).await);
    assert!(link.ensure_connected(&settings).await);

    assert!(server.await.unwrap(), "second connection was opened");
}

#[tokio::test]
async fn test_fetch_scan_logs_across_fragments() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();

        let request = next_request(&mut stream, &mut pending).await.unwrap();
        assert_eq!(request.command, CommandCode::GetAttendanceLog.code());

        let mut body = record(T0, 41);
        body.extend(record(T0 + 5, 42));
        body.extend(reply(CommandCode::GetAttendanceLog));

        stream.write_all(&body[..11]).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        stream.write_all(&body[11..20]).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        stream.write_all(&body[20..]).await.unwrap();

        sleep(Duration::from_secs(1)).await;
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.connect(&settings).await);

    let records = link.fetch_scan_logs(&settings).await;
    let users: Vec<u16> = records.iter().map(|r| r.device_user_id).collect();
    assert_eq!(users, vec![41, 42]);
    assert_eq!(records[1].timestamp.timestamp(), i64::from(T0 + 5));
}

#[tokio::test]
async fn test_fetch_returns_partial_records_on_deadline() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();
        next_request(&mut stream, &mut pending).await.unwrap();

        stream.write_all(&record(T0, 7)).await.unwrap();
        // Never send the end-of-log frame.
        sleep(Duration::from_secs(2)).await;
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.connect(&settings).await);

    let started = Instant::now();
    let records = link.fetch_scan_logs(&settings).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].device_user_id, 7);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(link.is_connected(), "deadline must not drop the session");
}

/// The CONNECT reply arrives in the same read as the log. A record whose
/// timestamp ends in 0xAA55 starts with the frame marker bytes.
#[tokio::test]
async fn test_fetch_after_late_connect_reply() {
    let (listener, settings) = terminal().await;
    let marked_ts = 0x6600_AA55;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();
        next_request(&mut stream, &mut pending).await.unwrap();

        let mut body = reply(CommandCode::Connect);
        body.extend(record(marked_ts, 41));
        body.extend(record(marked_ts + 1, 42));
        body.extend(reply(CommandCode::GetAttendanceLog));
        stream.write_all(&body).await.unwrap();

        sleep(Duration::from_secs(1)).await;
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.connect(&settings).await);

    let started = Instant::now();
    let records = link.fetch_scan_logs(&settings).await;

    let users: Vec<u16> = records.iter().map(|r| r.device_user_id).collect();
    assert_eq!(users, vec![41, 42]);
    assert_eq!(records[0].timestamp.timestamp(), i64::from(marked_ts));
    assert!(started.elapsed() < Duration::from_millis(250), "download hit the deadline");
}

#[tokio::test]
async fn test_relay_ack_after_late_connect_reply() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();
        next_request(&mut stream, &mut pending).await.unwrap();

        let mut body = reply(CommandCode::Connect);
        body.extend(reply(CommandCode::RelayControl));
        stream.write_all(&body).await.unwrap();

        sleep(Duration::from_millis(500)).await;
    });

    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    assert!(relay.unlock(&settings, 3).await);
}

#[tokio::test]
async fn test_connection_lost_during_fetch() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();
        next_request(&mut stream, &mut pending).await.unwrap();
        drop(stream);
    });

    let link = DeviceLink::new(fast_config());
    assert!(link.connect(&settings).await);

    assert!(link.fetch_scan_logs(&settings).await.is_empty());
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_relay_unlock_acknowledged() {
    let (listener, settings) = terminal().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();

        let request = next_request(&mut stream, &mut pending).await.unwrap();
        stream
            .write_all(&reply(CommandCode::RelayControl))
            .await
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        request
    });

    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    assert!(relay.unlock(&settings, 3).await);

    let request = server.await.unwrap();
    assert_eq!(request.command, CommandCode::RelayControl.code());
    assert_eq!(request.data.as_ref(), &[1, 3]);
}

#[tokio::test]
async fn test_relay_corrupted_ack_is_false() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();
        next_request(&mut stream, &mut pending).await.unwrap();

        let mut frame = reply(CommandCode::RelayControl);
        frame[FRAME_OVERHEAD - 3] ^= 0xFF;
        stream.write_all(&frame).await.unwrap();
        sleep(Duration::from_millis(500)).await;
    });

    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    assert!(!relay.unlock(&settings, 1).await);
}

#[tokio::test]
async fn test_relay_without_ack_times_out() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        while next_request(&mut stream, &mut pending).await.is_some() {}
    });

    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    let started = Instant::now();
    assert!(!relay.unlock(&settings, 1).await);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(link.is_connected());
}

#[tokio::test]
async fn test_relay_without_connection() {
    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));

    assert!(!relay.unlock(&DeviceSettings::new("127.0.0.1"), 3).await);
}

/// A reply that arrives after its exchange gave up must not be mistaken for
/// the answer to the next request.
#[tokio::test]
async fn test_late_reply_discarded_before_next_request() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();

        next_request(&mut stream, &mut pending).await.unwrap();
        sleep(Duration::from_millis(400)).await;
        let mut late = record(T0, 9);
        late.extend(reply(CommandCode::GetAttendanceLog));
        stream.write_all(&late).await.unwrap();

        next_request(&mut stream, &mut pending).await.unwrap();
        stream
            .write_all(&reply(CommandCode::RelayControl))
            .await
            .unwrap();
        sleep(Duration::from_millis(200)).await;
    });

    let link = Arc::new(DeviceLink::new(fast_config()));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    assert!(link.fetch_scan_logs(&settings).await.is_empty());
    sleep(Duration::from_millis(300)).await;

    assert!(relay.unlock(&settings, 2).await);
}

/// Concurrent callers share the one session without interleaving their
/// exchanges on the wire.
#[tokio::test]
async fn test_concurrent_exchanges_are_serialized() {
    let (listener, settings) = terminal().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = Vec::new();
        next_request(&mut stream, &mut pending).await.unwrap();

        while let Some(request) = next_request(&mut stream, &mut pending).await {
            // Any second request arriving before this reply would be a
            // protocol violation.
            assert!(pending.is_empty());
            sleep(Duration::from_millis(50)).await;

            let body = match request.command_code() {
                Some(CommandCode::GetAttendanceLog) => {
                    let mut body = record(T0, 41);
                    body.extend(reply(CommandCode::GetAttendanceLog));
                    body
                }
                Some(CommandCode::RelayControl) => reply(CommandCode::RelayControl),
                _ => continue,
            };
            stream.write_all(&body).await.unwrap();
        }
    });

    let link = Arc::new(DeviceLink::new(LinkConfig {
        log_fetch_timeout: Duration::from_secs(1),
        relay_ack_timeout: Duration::from_secs(1),
        ..fast_config()
    }));
    let relay = RelayController::new(Arc::clone(&link));
    assert!(link.connect(&settings).await);

    let (records, unlocked) = tokio::join!(
        link.fetch_scan_logs(&settings),
        relay.unlock(&settings, 3)
    );

    assert_eq!(records.len(), 1);
    assert!(unlocked);
}
