//! Integration tests for signer-link.
//!
//! These run the engine and facades against fake signers over real TCP
//! sockets and an in-memory HID device.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{echo, frame, responder, scripted, FakeHidBackend, WAIT};
use signer_link::codec::{MsgPackCodec, SignerMessage, SignerRequests};
use signer_link::config::{EngineConfig, HidConfig};
use signer_link::engine::{ConnectionEngine, ConnectionState};
use signer_link::event::{Event, SystemEventKind};
use signer_link::listener::{EventReceiver, ListenerId};
use signer_link::protocol::MessageType;
use signer_link::{
    BlockingClient, ClientConfig, HidTransport, NonBlockingClient, RawCodec, RawMessage,
    SessionId, SignerError, StreamTransport,
};

fn engine(port: u16, config: EngineConfig) -> ConnectionEngine<StreamTransport, RawCodec> {
    ConnectionEngine::new(StreamTransport::to("127.0.0.1", port), RawCodec, config)
}

/// Collect `n` events as display strings.
async fn take(events: &mut EventReceiver<RawMessage>, n: usize) -> Vec<String> {
    let mut seen = Vec::with_capacity(n);
    for _ in 0..n {
        seen.push(events.recv_timeout(WAIT).await.unwrap().to_string());
    }
    seen
}

/// A SUCCESS frame with an empty payload decodes to an empty message.
#[tokio::test]
async fn test_success_with_empty_payload() {
    let port = scripted(vec![frame(MessageType::Success, b"")], false).await;
    let engine = engine(port, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();

    engine.connect().await.unwrap();

    assert!(events
        .recv_timeout(WAIT)
        .await
        .unwrap()
        .is(SystemEventKind::Connected));
    let event = events.recv_timeout(WAIT).await.unwrap();
    assert_eq!(event.message_type(), Some(MessageType::Success));
    assert!(event.message().unwrap().payload.is_empty());

    engine.close().await.unwrap();
}

/// Frames are reassembled no matter how the stream splits them.
#[tokio::test]
async fn test_frames_split_byte_by_byte() {
    let mut bytes = frame(MessageType::Features, b"model T");
    bytes.extend(frame(MessageType::ButtonRequest, b""));
    let chunks = bytes.iter().map(|b| vec![*b]).collect();

    let port = scripted(chunks, false).await;
    let engine = engine(port, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    assert_eq!(
        take(&mut events, 3).await,
        vec!["SYSTEM(CONNECTED)", "FEATURES", "BUTTON_REQUEST"]
    );
}

/// A peer hang-up is EOF, reported once, and never FAILURE.
#[tokio::test]
async fn test_peer_close_reports_eof_once() {
    let port = scripted(vec![frame(MessageType::Success, b"bye")], true).await;
    let config = EngineConfig::default().eof_poll_interval(Duration::from_millis(10));
    let engine = engine(port, config);
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    assert_eq!(
        take(&mut events, 3).await,
        vec!["SYSTEM(CONNECTED)", "SUCCESS", "SYSTEM(EOF)"]
    );

    // several poll intervals later there is still nothing new
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.is_empty());
    assert_eq!(engine.state(), ConnectionState::Connected);

    engine.close().await.unwrap();
    assert_eq!(take(&mut events, 1).await, vec!["SYSTEM(DISCONNECTED)"]);
}

/// A peer that hangs up without sending anything is EOF, not FAILURE.
#[tokio::test]
async fn test_silent_peer_close_is_eof() {
    let port = scripted(Vec::new(), true).await;
    let engine = engine(port, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    assert_eq!(
        take(&mut events, 2).await,
        vec!["SYSTEM(CONNECTED)", "SYSTEM(EOF)"]
    );
}

/// A header code outside the registry is delivered as `Unknown`.
#[tokio::test]
async fn test_unknown_message_type_is_preserved() {
    let port = scripted(vec![frame(MessageType::from_code(0x7777), b"\x01\x02")], false).await;
    let engine = engine(port, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    let _connected = events.recv_timeout(WAIT).await.unwrap();
    let event = events.recv_timeout(WAIT).await.unwrap();
    assert_eq!(event.message_type(), Some(MessageType::Unknown(0x7777)));
    assert_eq!(event.message_type().unwrap().code(), 0x7777);
    assert_eq!(&event.message().unwrap().payload[..], &[0x01, 0x02]);
}

/// Every listener sees every event, in decode order.
#[tokio::test]
async fn test_fan_out_to_all_listeners() {
    let types = [
        MessageType::Features,
        MessageType::PinMatrixRequest,
        MessageType::ButtonRequest,
        MessageType::Success,
    ];
    let bytes = types.iter().flat_map(|t| frame(*t, b"x")).collect();
    let port = scripted(vec![bytes], false).await;

    let engine = engine(port, EngineConfig::default());
    let mut listeners = Vec::new();
    for _ in 0..3 {
        listeners.push(engine.add_listener(ListenerId::next()).await.unwrap());
    }
    engine.connect().await.unwrap();

    let mut expected = vec!["SYSTEM(CONNECTED)".to_string()];
    expected.extend(types.iter().map(|t| t.to_string()));
    for events in &mut listeners {
        assert_eq!(take(events, expected.len()).await, expected);
    }
}

/// A slow listener holds the read loop back instead of losing events.
#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    let frames: Vec<Vec<u8>> = (0u8..4)
        .map(|i| frame(MessageType::Success, &[i]))
        .collect();
    let port = scripted(frames, false).await;

    let engine = engine(port, EngineConfig::default().queue_capacity(1));
    let mut slow = engine.add_listener(ListenerId::next()).await.unwrap();
    let mut fast = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    // only CONNECTED fits until the slow listener reads
    let _ = fast.recv_timeout(WAIT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        fast.recv_timeout(Duration::from_millis(50)).await,
        Err(SignerError::Timeout(_))
    ));

    let reader = tokio::spawn(async move {
        let mut payloads = Vec::new();
        let _ = slow.recv_timeout(WAIT).await.unwrap();
        for _ in 0..4 {
            let event = slow.recv_timeout(WAIT).await.unwrap();
            payloads.push(event.message().unwrap().payload[0]);
        }
        payloads
    });

    let mut fast_payloads = Vec::new();
    for _ in 0..4 {
        let event = fast.recv_timeout(WAIT).await.unwrap();
        fast_payloads.push(event.message().unwrap().payload[0]);
    }
    assert_eq!(fast_payloads, vec![0, 1, 2, 3]);
    assert_eq!(reader.await.unwrap(), vec![0, 1, 2, 3]);
}

/// Close is idempotent and everything afterwards is rejected.
#[tokio::test]
async fn test_operations_after_close() {
    let (port, _requests) = responder(echo).await;
    let engine = engine(port, EngineConfig::default());
    engine.connect().await.unwrap();

    engine.close().await.unwrap();
    engine.close().await.unwrap();

    let ping = RawMessage::new(MessageType::Ping, &b"late"[..]);
    assert!(matches!(
        engine.send_message(&ping).await,
        Err(SignerError::NotConnected)
    ));
    assert!(matches!(engine.connect().await, Err(SignerError::NotConnected)));
    assert_eq!(engine.state(), ConnectionState::Closed);
}

/// Removing a listener stops delivery to it and leaves the others alone.
#[tokio::test]
async fn test_removed_listener_stops_receiving() {
    let (port, _requests) = responder(echo).await;
    let engine = engine(port, EngineConfig::default());
    let keep_id = ListenerId::next();
    let gone_id = ListenerId::next();
    let mut keep = engine.add_listener(keep_id).await.unwrap();
    let mut gone = engine.add_listener(gone_id).await.unwrap();
    engine.connect().await.unwrap();

    engine.remove_listener(gone_id).await.unwrap();
    engine
        .send_message(&RawMessage::empty(MessageType::Cancel))
        .await
        .unwrap();

    assert_eq!(
        take(&mut keep, 2).await,
        vec!["SYSTEM(CONNECTED)", "SUCCESS"]
    );
    let leftover: Vec<String> = gone.drain().iter().map(|e| e.to_string()).collect();
    assert_eq!(leftover, vec!["SYSTEM(CONNECTED)"]);
    assert!(gone.recv().await.is_none());
}

/// The device sees exactly the frames the client sent.
#[tokio::test]
async fn test_requests_reach_device() {
    let (port, mut requests) = responder(echo).await;
    let client = NonBlockingClient::new(
        StreamTransport::to("127.0.0.1", port),
        RawCodec,
        EngineConfig::default(),
    )
    .await
    .unwrap();
    client.connect().await.unwrap();
    client.ping("hi").await.unwrap();
    client.initialize().await.unwrap();

    let ping = requests.recv().await.unwrap();
    assert_eq!(ping.message_type(), MessageType::Ping);
    assert_eq!(ping.payload(), &b"\x0a\x02hi"[..]);

    let init = requests.recv().await.unwrap();
    assert_eq!(init.message_type(), MessageType::Initialize);
    assert_eq!(&init.payload()[2..], client.session_id().as_bytes());
}

/// The blocking facade returns the next event for each call.
#[tokio::test]
async fn test_blocking_client_from_config() {
    let (port, _requests) = responder(|request| match request.message_type() {
        MessageType::Initialize => frame(MessageType::Features, b"vendor"),
        _ => echo(request),
    })
    .await;

    let config = ClientConfig::stream("127.0.0.1", port);
    let mut client = BlockingClient::from_config(&config, RawCodec).await.unwrap();

    assert!(client
        .connect()
        .await
        .unwrap()
        .is(SystemEventKind::Connected));
    assert_eq!(
        client.initialize().await.unwrap().message_type(),
        Some(MessageType::Features)
    );
    assert_eq!(
        client.ping("p").await.unwrap().message_type(),
        Some(MessageType::Success)
    );
    client.close().await.unwrap();
}

/// Connecting to nothing fails and the engine can try again.
#[tokio::test]
async fn test_connect_failure_is_retryable() {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let engine = engine(port, EngineConfig::default());

    assert!(matches!(
        engine.connect().await,
        Err(SignerError::Connect { .. })
    ));
    assert_eq!(engine.state(), ConnectionState::Disconnected);
    assert!(matches!(
        engine.connect().await,
        Err(SignerError::Connect { .. })
    ));
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
enum Msg {
    Ping { message: String },
    Initialize { session_id: Vec<u8> },
    Success { message: String },
}

impl SignerMessage for Msg {
    fn message_type(&self) -> MessageType {
        match self {
            Msg::Ping { .. } => MessageType::Ping,
            Msg::Initialize { .. } => MessageType::Initialize,
            Msg::Success { .. } => MessageType::Success,
        }
    }
}

impl SignerRequests for Msg {
    fn ping(text: &str) -> Self {
        Msg::Ping {
            message: text.to_string(),
        }
    }

    fn initialize(session_id: &SessionId) -> Self {
        Msg::Initialize {
            session_id: session_id.as_bytes().to_vec(),
        }
    }
}

/// Structured messages travel through the engine with the MsgPack codec.
#[tokio::test]
async fn test_msgpack_messages() {
    let reply = rmp_serde::to_vec_named(&Msg::Success {
        message: "pong".to_string(),
    })
    .unwrap();
    let (port, mut requests) = responder(move |_| frame(MessageType::Success, &reply)).await;

    let mut client = BlockingClient::new(
        StreamTransport::to("127.0.0.1", port),
        MsgPackCodec::<Msg>::new(),
        EngineConfig::default(),
    )
    .await
    .unwrap();
    client.connect().await.unwrap();

    let event = client.ping("ping").await.unwrap();
    assert_eq!(
        event.message(),
        Some(&Msg::Success {
            message: "pong".to_string()
        })
    );

    let request = requests.recv().await.unwrap();
    let sent: Msg = rmp_serde::from_slice(request.payload()).unwrap();
    assert_eq!(sent, Msg::ping("ping"));
}

/// A payload the codec cannot parse ends the read loop with FAILURE.
#[tokio::test]
async fn test_malformed_payload_is_failure() {
    let port = scripted(vec![frame(MessageType::Success, b"\xc1 not msgpack")], false).await;
    let engine = ConnectionEngine::new(
        StreamTransport::to("127.0.0.1", port),
        MsgPackCodec::<Msg>::new(),
        EngineConfig::default(),
    );
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    let _connected = events.recv_timeout(WAIT).await.unwrap();
    let event: Event<Msg> = events.recv_timeout(WAIT).await.unwrap();
    assert!(event.is(SystemEventKind::Failure));
}

fn hid_config() -> HidConfig {
    HidConfig {
        read_timeout_ms: 20,
        ..HidConfig::default()
    }
}

/// Over HID the same requests are chunked, echoed and reassembled.
#[tokio::test]
async fn test_hid_round_trip() {
    let backend = FakeHidBackend::new();
    let state = Arc::clone(&backend.state);
    let transport = HidTransport::new(backend, hid_config());
    let config = EngineConfig::default().shutdown_grace(Duration::from_millis(200));

    let mut client = BlockingClient::new(transport, RawCodec, config)
        .await
        .unwrap();
    assert!(client
        .connect()
        .await
        .unwrap()
        .is(SystemEventKind::Connected));

    // 150 byte text: 161 byte frame, three reports each way
    let text = "s".repeat(150);
    let reply = client.ping(&text).await.unwrap();
    assert_eq!(reply.message_type(), Some(MessageType::Success));
    assert_eq!(&reply.message().unwrap().payload[3..], text.as_bytes());

    client.close().await.unwrap();

    let state = state.lock();
    assert_eq!(state.requests.len(), 1);
    assert_eq!(state.written.len(), 3);
    assert!(state.written.iter().all(|r| r.len() == 64));
    assert_eq!(
        state.features,
        vec![vec![0x41, 0x01], vec![0x43, 0x03], vec![0x41, 0x00]]
    );
}

/// A report claiming more than 63 valid bytes fails the link.
#[tokio::test]
async fn test_hid_overlong_report_is_failure() {
    let backend = FakeHidBackend::new();
    let state = Arc::clone(&backend.state);
    let transport = HidTransport::new(backend, hid_config());
    let engine = ConnectionEngine::new(transport, RawCodec, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();
    assert!(events
        .recv_timeout(WAIT)
        .await
        .unwrap()
        .is(SystemEventKind::Connected));

    state.lock().inbound.push_back(vec![64u8; 64]);

    let failure = events.recv_timeout(WAIT).await.unwrap();
    assert!(failure.is(SystemEventKind::Failure));
    assert_eq!(engine.state(), ConnectionState::Connected);

    engine.close().await.unwrap();
    assert!(events
        .recv_timeout(WAIT)
        .await
        .unwrap()
        .is(SystemEventKind::Disconnected));
}

/// An idle HID link produces no events.
#[tokio::test]
async fn test_hid_idle_link_is_quiet() {
    let transport = HidTransport::new(FakeHidBackend::new(), hid_config());
    let engine = ConnectionEngine::new(transport, RawCodec, EngineConfig::default());
    let mut events = engine.add_listener(ListenerId::next()).await.unwrap();
    engine.connect().await.unwrap();

    let _connected = events.recv_timeout(WAIT).await.unwrap();
    assert!(matches!(
        events.recv_timeout(Duration::from_millis(100)).await,
        Err(SignerError::Timeout(_))
    ));
    engine.close().await.unwrap();
}
