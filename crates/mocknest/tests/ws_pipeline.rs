//! End-to-end tests for the WebSocket mock servers, exercised over loopback
//! with a real tungstenite client.

use futures::{SinkExt, StreamExt};
use mocknest::model::{WsMatchType, WsRule, WsServerConfig};
use mocknest::store::{FileStore, ServiceStore};
use mocknest::ws::WsMockManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn echo_config(port: u16) -> WsServerConfig {
    WsServerConfig {
        id: "ws-test".to_string(),
        name: "test".to_string(),
        port,
        path: "/ws".to_string(),
        on_connect_message: "welcome".to_string(),
        rules: vec![
            WsRule {
                match_type: WsMatchType::Exact,
                match_pattern: "ping".to_string(),
                response_basic: "pong".to_string(),
                ..Default::default()
            },
            WsRule {
                match_type: WsMatchType::Any,
                response_basic: "default".to_string(),
                ..Default::default()
            },
        ],
    }
}

async fn recv_text(
    stream: &mut (impl futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> String {
    loop {
        let message = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return text;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn greeting_then_rule_responses_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ServiceStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let port = free_port();
    store.save_ws_servers(&[echo_config(port)]).unwrap();

    let manager = WsMockManager::new(Arc::clone(&store));
    manager.start("ws-test").await.unwrap();

    let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .unwrap();

    // The greeting arrives before any rule response.
    assert_eq!(recv_text(&mut stream).await, "welcome");

    stream.send(Message::Text("ping".to_string())).await.unwrap();
    assert_eq!(recv_text(&mut stream).await, "pong");

    stream.send(Message::Text("anything else".to_string())).await.unwrap();
    assert_eq!(recv_text(&mut stream).await, "default");

    stream.close(None).await.ok();
    manager.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_path_is_rejected_during_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ServiceStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let port = free_port();
    store.save_ws_servers(&[echo_config(port)]).unwrap();

    let manager = WsMockManager::new(Arc::clone(&store));
    manager.start("ws-test").await.unwrap();

    let result =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/elsewhere")).await;
    assert!(result.is_err());

    manager.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn operator_can_send_broadcast_and_inspect_clients() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ServiceStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let port = free_port();
    let mut config = echo_config(port);
    config.on_connect_message = String::new();
    store.save_ws_servers(&[config]).unwrap();

    let manager = WsMockManager::new(Arc::clone(&store));
    manager.start("ws-test").await.unwrap();

    let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .unwrap();

    // Registration is racy with the handshake completing; poll briefly.
    let mut clients = Vec::new();
    for _ in 0..50 {
        clients = manager.clients("ws-test").unwrap();
        if !clients.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(clients.len(), 1);
    let client_id = clients[0].id.clone();

    manager.send_to("ws-test", &client_id, "direct").unwrap();
    assert_eq!(recv_text(&mut stream).await, "direct");

    let addressed = manager.broadcast("ws-test", "to everyone").unwrap();
    assert_eq!(addressed, 1);
    assert_eq!(recv_text(&mut stream).await, "to everyone");

    // The interaction log saw the outbound traffic.
    let logs = manager.logs("ws-test", None).unwrap();
    assert!(logs.iter().any(|e| e.message == "direct"));

    manager.disconnect("ws-test", &client_id).unwrap();
    // After the close frame, the stream ends.
    let mut closed = false;
    for _ in 0..50 {
        match timeout(Duration::from_millis(200), stream.next()).await {
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) => {
                closed = true;
                break;
            }
            _ => {}
        }
    }
    assert!(closed);

    manager.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn scripted_ws_response_sees_message_and_client_id() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ServiceStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let port = free_port();
    let mut config = echo_config(port);
    config.on_connect_message = String::new();
    config.rules = vec![WsRule {
        match_type: WsMatchType::Any,
        response_mode: mocknest::model::ResponseMode::Advanced,
        response_advanced: r#"
            fn main(req, faker) {
                "echo: " + req.message
            }
        "#
        .to_string(),
        ..Default::default()
    }];
    store.save_ws_servers(&[config]).unwrap();

    let manager = WsMockManager::new(Arc::clone(&store));
    manager.start("ws-test").await.unwrap();

    let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .unwrap();
    stream.send(Message::Text("hello".to_string())).await.unwrap();
    assert_eq!(recv_text(&mut stream).await, "echo: hello");

    stream.close(None).await.ok();
    manager.shutdown();
}
