use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tungstenite::protocol::Message as WsMessage;

use crate::bench::message::Qos;
use crate::config::Settings;
use crate::transport::message::{ClientMessage, ServerMessage, decode_payload, encode_payload};
use crate::transport::{ConnectOptions, Connector, MessagingClient, WsConnector, tls};
use crate::utils::BenchError;

async fn reply(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    msg: &ServerMessage,
) {
    let text = serde_json::to_string(msg).unwrap();
    ws.send(WsMessage::text(text)).await.unwrap();
}

fn parse(msg: &WsMessage) -> ClientMessage {
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

/// Accepts one connection, answers login/auth, echoes every publish back as
/// a QoS 1 delivery and stops after the first ack.
async fn echo_broker(listener: TcpListener, seen: oneshot::Sender<Vec<ClientMessage>>) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    let mut frames = Vec::new();

    while let Some(Ok(msg)) = ws.next().await {
        if !msg.is_text() {
            continue;
        }
        let frame = parse(&msg);
        match &frame {
            ClientMessage::Login { .. } => {
                reply(&mut ws, &ServerMessage::LoginResponse {
                    token: "tok".to_string(),
                })
                .await
            }
            ClientMessage::Auth { .. } => reply(&mut ws, &ServerMessage::Authenticated {}).await,
            ClientMessage::Publish { topic, payload, .. } => {
                reply(&mut ws, &ServerMessage::Message {
                    topic: topic.clone(),
                    payload: payload.clone(),
                    timestamp: 0,
                    message_id: "m-1".to_string(),
                    qos: 1,
                })
                .await
            }
            _ => {}
        }
        let acked = matches!(frame, ClientMessage::Ack { .. });
        frames.push(frame);
        if acked {
            break;
        }
    }
    let _ = seen.send(frames);
}

#[test]
fn test_publish_frame_shape() {
    let frame = ClientMessage::publish("/t-0", &[0, 1, 2, 255], 1);
    let value = serde_json::to_value(&frame).unwrap();

    assert_eq!(value["type"], "publish");
    assert_eq!(value["topic"], "/t-0");
    assert_eq!(value["qos"], 1);
    assert!(value["message_id"].is_string());
    let payload = value["payload"].as_str().unwrap();
    assert_eq!(decode_payload(payload).unwrap(), vec![0, 1, 2, 255]);
}

#[test]
fn test_server_frames_parse() {
    let delivery = json!({
        "type": "message",
        "topic": "/t-0",
        "payload": encode_payload(b"abc"),
        "timestamp": 1_700_000_000_000i64,
        "message_id": "42",
        "qos": 1
    });
    match serde_json::from_value::<ServerMessage>(delivery).unwrap() {
        ServerMessage::Message {
            topic,
            payload,
            message_id,
            qos,
            ..
        } => {
            assert_eq!(topic, "/t-0");
            assert_eq!(decode_payload(&payload).unwrap(), b"abc");
            assert_eq!(message_id, "42");
            assert_eq!(qos, 1);
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    let auth = serde_json::from_value::<ServerMessage>(json!({ "type": "authenticated" }));
    assert!(matches!(auth, Ok(ServerMessage::Authenticated {})));
}

#[test]
fn test_invalid_base64_is_rejected() {
    assert!(decode_payload("not base64!").is_none());
}

#[test]
fn test_credentials_need_both_halves() {
    let options = ConnectOptions::new("ws://localhost:8080", "c".to_string());
    assert!(!options.has_credentials());
    assert!(!options.clone().with_credentials("user", "").has_credentials());
    assert!(options.with_credentials("user", "secret").has_credentials());
}

#[tokio::test]
async fn test_login_subscribe_publish_and_ack() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = oneshot::channel();
    tokio::spawn(echo_broker(listener, seen_tx));

    let options =
        ConnectOptions::new(&url, "publisher-0-0".to_string()).with_credentials("user", "secret");
    let client = WsConnector::default().connect(options).await.unwrap();
    assert_eq!(client.client_id(), "publisher-0-0");

    let mut deliveries = client.subscribe("/t-0", Qos::AtLeastOnce).await.unwrap();
    client
        .publish("/t-0", Qos::AtLeastOnce, vec![9, 8, 7, 6, 5, 4, 3, 2, 1])
        .await
        .unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.topic, "/t-0");
    assert_eq!(delivery.payload, vec![9, 8, 7, 6, 5, 4, 3, 2, 1]);

    let frames = tokio::time::timeout(Duration::from_secs(5), seen_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        &frames[0],
        ClientMessage::Login { username, password } if username == "user" && password == "secret"
    ));
    assert!(matches!(&frames[1], ClientMessage::Auth { token } if token == "tok"));
    assert!(matches!(&frames[2], ClientMessage::Subscribe { topic } if topic == "/t-0"));
    assert!(matches!(&frames[3], ClientMessage::Publish { qos: Some(1), .. }));
    assert!(matches!(&frames[4], ClientMessage::Ack { message_id } if message_id == "m-1"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_subscriptions_survive_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        // first session: take the subscription, then drop the socket
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let first = ws.next().await.unwrap().unwrap();
        assert!(matches!(parse(&first), ClientMessage::Subscribe { .. }));
        drop(ws);

        // second session: the subscription must be replayed before anything else
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let replayed = ws.next().await.unwrap().unwrap();
        match parse(&replayed) {
            ClientMessage::Subscribe { topic } => assert_eq!(topic, "/r-0"),
            other => panic!("expected a resubscribe, got {other:?}"),
        }
        reply(&mut ws, &ServerMessage::Message {
            topic: "/r-0".to_string(),
            payload: encode_payload(b"after"),
            timestamp: 0,
            message_id: "m-2".to_string(),
            qos: 0,
        })
        .await;
        // keep the socket open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut options = ConnectOptions::new(&url, "subscriber-0-0".to_string());
    options.reconnect_delay = Duration::from_millis(50);
    let client = WsConnector::default().connect(options).await.unwrap();
    let mut deliveries = client.subscribe("/r-0", Qos::AtMostOnce).await.unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.payload, b"after");

    client.disconnect().await;
}

#[tokio::test]
async fn test_abandoned_publish_is_not_sent_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (first_tx, first_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        drop(ws);

        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_text() {
                let _ = first_tx.send(parse(&msg));
                break;
            }
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut options = ConnectOptions::new(&url, "publisher-0-0".to_string());
    options.reconnect_delay = Duration::from_millis(500);
    let client = WsConnector::default().connect(options).await.unwrap();

    // let the client notice the dropped socket
    tokio::time::sleep(Duration::from_millis(100)).await;
    let gave_up = tokio::time::timeout(
        Duration::from_millis(50),
        client.publish("/p-0", Qos::AtMostOnce, b"stale".to_vec()),
    )
    .await;
    assert!(gave_up.is_err());

    client
        .publish("/p-0", Qos::AtMostOnce, b"fresh".to_vec())
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), first_rx)
        .await
        .unwrap()
        .unwrap();
    match first {
        ClientMessage::Publish { payload, .. } => {
            assert_eq!(decode_payload(&payload).unwrap(), b"fresh")
        }
        other => panic!("expected a publish, got {other:?}"),
    }

    client.disconnect().await;
}

#[tokio::test]
async fn test_unreachable_broker_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = WsConnector::default()
        .connect(ConnectOptions::new(&url, "c".to_string()))
        .await;
    assert!(matches!(result, Err(BenchError::Connect { .. })));
}

#[test]
fn test_no_client_tls_without_cert_pair() {
    let settings = Settings::default();
    assert!(tls::from_settings(&settings.broker).unwrap().is_none());
}

#[test]
fn test_unreadable_cert_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("client.pem");
    let key = dir.path().join("client.key");
    std::fs::write(&cert, "not a certificate").unwrap();
    std::fs::write(&key, "not a key").unwrap();

    let mut settings = Settings::default();
    settings.broker.client_cert = Some(cert);
    settings.broker.client_key = Some(key);

    let err = tls::from_settings(&settings.broker).unwrap_err();
    assert!(matches!(err, BenchError::Tls(_)));
}

#[test]
fn test_default_tls_config_builds() {
    assert!(tls::default_client_config().is_ok());
}
