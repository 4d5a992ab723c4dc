//! End-to-end tests using real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use vox_server::config::ServerConfig;
use vox_server::server::{RunningServer, VoxServer};
use vox_store::{MemoryPresenceStore, PresenceStore, StoreError};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn test_config() -> ServerConfig {
    ServerConfig {
        shutdown_grace: Duration::from_millis(50),
        listener_shutdown_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    }
}

/// Boot a test server on an ephemeral port.
async fn boot_server(store: Arc<dyn PresenceStore>) -> (Arc<VoxServer>, RunningServer) {
    let server = Arc::new(VoxServer::new(test_config(), store));
    let running = server.start().await.unwrap();
    (server, running)
}

async fn connect(addr: SocketAddr, path: &str, username: &str) -> WsStream {
    let url = format!("ws://{addr}/{path}?username={username}");
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

/// Next `userUpdate` payload, skipping audio frames.
async fn next_user_update(ws: &mut WsStream) -> Vec<String> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for userUpdate")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(_) = msg {
            let value: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            assert_eq!(value["type"], "userUpdate");
            return value["users"]
                .as_array()
                .unwrap()
                .iter()
                .map(|u| u.as_str().unwrap().to_string())
                .collect();
        }
    }
}

/// Read snapshots until one matches `expected` as a multiset.
async fn wait_for_users(ws: &mut WsStream, expected: &[&str]) {
    let mut want: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
    want.sort();
    loop {
        let mut got = next_user_update(ws).await;
        got.sort();
        if got == want {
            return;
        }
    }
}

/// Next binary frame, skipping presence updates.
async fn next_binary(ws: &mut WsStream, within: Duration) -> Option<Vec<u8>> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Binary(data)))) => return Some(data.to_vec()),
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_)) | None) | Err(_) => return None,
        }
    }
}

/// Read until the server closes the socket. Returns `true` on a clean close.
async fn wait_for_close(ws: &mut WsStream) -> bool {
    loop {
        match timeout(TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Close(_))) | None) => return true,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Err(_) => return false,
        }
    }
}

fn status_of(err: &tungstenite::Error) -> Option<u16> {
    match err {
        tungstenite::Error::Http(resp) => Some(resp.status().as_u16()),
        _ => None,
    }
}

/// A store whose mutations always fail.
struct BrokenStore;

#[async_trait]
impl PresenceStore for BrokenStore {
    fn backend(&self) -> &'static str {
        "broken"
    }
    async fn ping(&self) -> vox_store::Result<()> {
        Ok(())
    }
    async fn add(&self, _username: &str) -> vox_store::Result<()> {
        Err(StoreError::Database("write refused".into()))
    }
    async fn remove(&self, _username: &str) -> vox_store::Result<bool> {
        Err(StoreError::Database("write refused".into()))
    }
    async fn list(&self) -> vox_store::Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn disconnect(&self) -> vox_store::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn join_broadcasts_presence_to_everyone() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (_server, running) = boot_server(store).await;

    let mut a = connect(running.addr, "join", "A").await;
    wait_for_users(&mut a, &["A"]).await;
    let mut b = connect(running.addr, "join", "B").await;

    wait_for_users(&mut a, &["A", "B"]).await;
    wait_for_users(&mut b, &["A", "B"]).await;
}

#[tokio::test]
async fn audio_reaches_others_but_not_sender() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (_server, running) = boot_server(store).await;

    let mut a = connect(running.addr, "join", "A").await;
    wait_for_users(&mut a, &["A"]).await;
    let mut b = connect(running.addr, "join", "B").await;
    wait_for_users(&mut a, &["A", "B"]).await;
    wait_for_users(&mut b, &["A", "B"]).await;

    a.send(Message::Binary(vec![0x01, 0x02].into())).await.unwrap();

    let got = next_binary(&mut b, TIMEOUT).await;
    assert_eq!(got.as_deref(), Some(&[0x01, 0x02][..]));
    assert_eq!(next_binary(&mut a, Duration::from_millis(300)).await, None);
}

#[tokio::test]
async fn text_frames_are_not_relayed() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (_server, running) = boot_server(store).await;

    let mut a = connect(running.addr, "ws", "A").await;
    let mut b = connect(running.addr, "ws", "B").await;
    wait_for_users(&mut a, &[]).await;
    wait_for_users(&mut b, &[]).await;

    a.send(Message::Text("hello".into())).await.unwrap();
    a.send(Message::Binary(vec![0x09].into())).await.unwrap();

    // The first frame B sees after the text is the binary one.
    assert_eq!(next_binary(&mut b, TIMEOUT).await, Some(vec![0x09]));
}

#[tokio::test]
async fn leave_removes_user_from_snapshot() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (_server, running) = boot_server(store.clone()).await;

    let mut a = connect(running.addr, "join", "A").await;
    let mut b = connect(running.addr, "join", "B").await;
    wait_for_users(&mut a, &["A", "B"]).await;
    wait_for_users(&mut b, &["A", "B"]).await;

    let _b_again = connect(running.addr, "leave", "B").await;
    wait_for_users(&mut a, &["A"]).await;
    assert_eq!(store.list().await.unwrap(), vec!["A"]);
}

#[tokio::test]
async fn ws_endpoint_leaves_store_untouched() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (server, running) = boot_server(store.clone()).await;

    let mut a = connect(running.addr, "ws", "lurker").await;
    wait_for_users(&mut a, &[]).await;
    assert_eq!(server.room().len(), 1);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn disconnect_removes_member() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (server, running) = boot_server(store).await;

    let mut a = connect(running.addr, "join", "A").await;
    wait_for_users(&mut a, &["A"]).await;
    let mut b = connect(running.addr, "join", "B").await;
    wait_for_users(&mut b, &["A", "B"]).await;
    assert_eq!(server.room().len(), 2);

    b.close(None).await.unwrap();
    drop(b);

    timeout(TIMEOUT, async {
        while server.room().len() != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("member was not removed");
}

#[tokio::test]
async fn store_failure_answers_500_without_upgrade() {
    let (server, running) = boot_server(Arc::new(BrokenStore)).await;

    let url = format!("ws://{}/join?username=A", running.addr);
    let err = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap_err();
    assert_eq!(status_of(&err), Some(500));

    let url = format!("ws://{}/leave?username=A", running.addr);
    let err = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap_err();
    assert_eq!(status_of(&err), Some(500));

    assert!(server.room().is_empty());
}

#[tokio::test]
async fn draining_server_refuses_upgrades() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (server, running) = boot_server(store.clone()).await;
    server.room().stop_accepting();

    let url = format!("ws://{}/join?username=late", running.addr);
    let err = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap_err();
    assert_eq!(status_of(&err), Some(503));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_connections() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (_server, running) = boot_server(store).await;

    let mut a = connect(running.addr, "join", "A").await;
    wait_for_users(&mut a, &["A"]).await;

    let json: serde_json::Value = reqwest::get(format!("http://{}/health", running.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connections"], 1);
}

#[tokio::test]
async fn shutdown_closes_clients_and_stops_listener() {
    let store = Arc::new(MemoryPresenceStore::new());
    let (server, running) = boot_server(store.clone()).await;
    let addr = running.addr;

    let mut a = connect(addr, "join", "A").await;
    wait_for_users(&mut a, &["A"]).await;
    let mut c = connect(addr, "join", "C").await;
    wait_for_users(&mut c, &["A", "C"]).await;

    let report = timeout(TIMEOUT, server.stop(running))
        .await
        .expect("shutdown timed out")
        .expect("shutdown failed");
    assert_eq!(report.connections_closed, 2);
    assert!(report.store_disconnected);

    assert!(wait_for_close(&mut a).await);
    assert!(wait_for_close(&mut c).await);
    assert!(server.room().is_empty());

    let refused = connect_async(format!("ws://{addr}/ws?username=X")).await;
    assert!(refused.is_err());
}
