//! Integration tests for wavecast-network

use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use stl_io::{write_stl, Triangle, Vector};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use wavecast_mesh::{HeadlessDisplay, ModelPipeline};
use wavecast_network::{
    run_pipeline, spawn_transport, ClientConfig, ConnectionError, MeshStream, ServerConfig,
    ServerError, TransportEvent, WavecastServer,
};

const WAIT: Duration = Duration::from_secs(10);

fn triangle_stl(offset: f32) -> Vec<u8> {
    let triangle = Triangle {
        normal: Vector::new([0.0, 0.0, 1.0]),
        vertices: [
            Vector::new([offset, 0.0, 0.0]),
            Vector::new([offset + 1.0, 0.0, 0.0]),
            Vector::new([offset, 1.0, 0.0]),
        ],
    };
    let mut bytes = Vec::new();
    write_stl(&mut bytes, [triangle].iter()).expect("Failed to write STL");
    bytes
}

/// Binary STL with `count` triangles, 84 + 50 * count bytes long
fn strip_stl(count: usize) -> Vec<u8> {
    let triangles: Vec<Triangle> = (0..count)
        .map(|i| {
            let x = i as f32;
            Triangle {
                normal: Vector::new([0.0, 0.0, 1.0]),
                vertices: [
                    Vector::new([x, 0.0, 0.0]),
                    Vector::new([x + 1.0, 0.0, 0.0]),
                    Vector::new([x, 1.0, 0.0]),
                ],
            }
        })
        .collect();
    let mut bytes = Vec::new();
    write_stl(&mut bytes, triangles.iter()).expect("Failed to write STL");
    bytes
}

fn local_config(watch_path: &Path) -> ServerConfig {
    ServerConfig {
        port: 0,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServerConfig::for_file(watch_path)
    }
}

async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = WavecastServer::bind(config)
        .await
        .expect("Failed to bind server");
    let addr = server.local_addr();
    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            panic!("Server failed: {}", e);
        }
    });
    addr
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/ws", addr)
}

async fn connect(addr: SocketAddr) -> MeshStream {
    connect_with(addr, &ClientConfig::default()).await
}

async fn connect_with(addr: SocketAddr, config: &ClientConfig) -> MeshStream {
    timeout(WAIT, MeshStream::connect(&ws_url(addr), config))
        .await
        .expect("Timed out connecting")
        .expect("Failed to connect")
}

async fn next(stream: &mut MeshStream) -> Bytes {
    timeout(WAIT, stream.next_payload())
        .await
        .expect("Timed out waiting for payload")
        .expect("Connection error")
        .expect("Connection closed")
}

/// Skip payloads until one matches, tolerating reads taken mid-save
async fn wait_for(stream: &mut MeshStream, expected: &[u8]) {
    timeout(WAIT, async {
        loop {
            let payload = stream
                .next_payload()
                .await
                .expect("Connection error")
                .expect("Connection closed");
            if payload.as_ref() == expected {
                return;
            }
        }
    })
    .await
    .expect("Timed out waiting for expected payload");
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("model.stl");
    std::fs::write(&path, triangle_stl(0.0)).expect("Failed to write model");
    (dir, path)
}

#[tokio::test]
async fn test_new_viewer_receives_current_file() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let mut stream = connect(addr).await;
    let payload = next(&mut stream).await;
    assert_eq!(payload.as_ref(), triangle_stl(0.0).as_slice());
    assert_eq!(stream.stats().payloads_received, 1);
}

#[tokio::test]
async fn test_file_change_is_broadcast() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    next(&mut first).await;
    next(&mut second).await;

    let updated = triangle_stl(5.0);
    std::fs::write(&path, &updated).expect("Failed to update model");

    wait_for(&mut first, &updated).await;
    wait_for(&mut second, &updated).await;
}

#[tokio::test]
async fn test_closed_viewer_does_not_block_others() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;
    next(&mut leaving).await;
    next(&mut staying).await;

    leaving.close().await.expect("Failed to close");

    let updated = triangle_stl(2.0);
    std::fs::write(&path, &updated).expect("Failed to update model");
    wait_for(&mut staying, &updated).await;
}

#[tokio::test]
async fn test_read_failure_does_not_stop_server() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let mut stream = connect(addr).await;
    next(&mut stream).await;

    // The removal triggers a failed read; the next save must still go out
    std::fs::remove_file(&path).expect("Failed to remove model");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let restored = triangle_stl(7.0);
    std::fs::write(&path, &restored).expect("Failed to restore model");
    wait_for(&mut stream, &restored).await;

    // New viewers are still served
    let mut late = connect(addr).await;
    assert_eq!(next(&mut late).await.as_ref(), restored.as_slice());
}

#[tokio::test]
async fn test_run_pipeline_applies_payload() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let mut display = HeadlessDisplay::new();
    let mut pipeline = ModelPipeline::default();
    let mut summaries = Vec::new();

    let config = ClientConfig::default();
    let url = ws_url(addr);

    let processed = timeout(
        WAIT,
        run_pipeline(&url, &config, &mut pipeline, &mut display, |outcome| {
            let summary = outcome.as_ref().cloned().map_err(|e| e.to_string());
            summaries.push(summary);
            false
        }),
    )
    .await
    .expect("Timed out")
    .expect("Pipeline failed");

    assert_eq!(processed, 1);
    let summary = summaries[0].as_ref().expect("Payload should decode");
    assert_eq!(summary.vertices, 3);
    assert_eq!(summary.edges, 3);
    assert_eq!(display.attached_count(), 1);
}

#[tokio::test]
async fn test_spawn_transport_reports_events() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    let (events, _handle) = spawn_transport(ws_url(addr), ClientConfig::default());
    let events = tokio::task::spawn_blocking(move || {
        let first = events.recv_timeout(WAIT).expect("No connect event");
        let second = events.recv_timeout(WAIT).expect("No payload event");
        (first, second)
    })
    .await
    .expect("Blocking task failed");

    assert!(matches!(events.0, TransportEvent::Connected { .. }));
    match events.1 {
        TransportEvent::Payload(payload) => {
            assert_eq!(payload.as_ref(), triangle_stl(0.0).as_slice())
        }
        other => panic!("Expected payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spawn_transport_reports_failed_connect() {
    // Bind and drop a listener to get a port nothing listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let (events, _handle) = spawn_transport(ws_url(addr), ClientConfig::default());
    let event = tokio::task::spawn_blocking(move || events.recv_timeout(WAIT))
        .await
        .unwrap()
        .expect("No event");
    assert!(matches!(event, TransportEvent::Closed(Some(_))));
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let (_dir, path) = setup();
    let first = WavecastServer::bind(local_config(&path))
        .await
        .expect("Failed to bind");

    let taken = ServerConfig {
        port: first.local_addr().port(),
        ..local_config(&path)
    };
    let result = WavecastServer::bind(taken).await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let result = WavecastServer::bind(ServerConfig::default()).await;
    assert!(matches!(result, Err(ServerError::Config(_))));
}

#[tokio::test]
async fn test_static_root_is_served() {
    let (dir, path) = setup();
    let assets = dir.path().join("public");
    std::fs::create_dir(&assets).unwrap();
    std::fs::write(assets.join("index.html"), "<h1>viewer</h1>").unwrap();

    let config = ServerConfig {
        static_root: Some(assets),
        ..local_config(&path)
    };
    let addr = start_server(config).await;

    let request = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    socket.write_all(request).await.unwrap();
    let mut response = String::new();
    timeout(WAIT, socket.read_to_string(&mut response))
        .await
        .expect("Timed out")
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("<h1>viewer</h1>"));
}

#[tokio::test]
async fn test_file_larger_than_16_mib_is_delivered() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("large.stl");
    // 340,000 triangles: 17,000,084 bytes in a single frame
    let large = strip_stl(340_000);
    assert!(large.len() > 16 * 1024 * 1024);
    std::fs::write(&path, &large).expect("Failed to write model");

    let addr = start_server(local_config(&path)).await;
    let mut stream = connect(addr).await;
    let payload = next(&mut stream).await;

    assert_eq!(payload.len(), large.len());
    assert_eq!(stream.stats().bytes_received, large.len() as u64);
}

#[tokio::test]
async fn test_payload_over_configured_limit_is_rejected() {
    let (_dir, path) = setup();
    let addr = start_server(local_config(&path)).await;

    // The single-triangle file is 134 bytes
    let config = ClientConfig {
        max_message_size: 100,
    };
    let mut stream = connect_with(addr, &config).await;
    let result = timeout(WAIT, stream.next_payload())
        .await
        .expect("Timed out waiting for payload");

    assert!(matches!(result, Err(ConnectionError::WebSocket(_))));
}

#[tokio::test]
async fn test_watch_failure_leaves_no_tasks_behind() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("missing").join("model.stl");
    let server = WavecastServer::bind(local_config(&path))
        .await
        .expect("Failed to bind");

    let metrics = tokio::runtime::Handle::current().metrics();
    let tasks_before = metrics.num_alive_tasks();

    let result = timeout(WAIT, server.serve()).await.expect("Timed out");
    assert!(matches!(result, Err(ServerError::Watch(_))));

    tokio::task::yield_now().await;
    assert_eq!(metrics.num_alive_tasks(), tasks_before);
}
