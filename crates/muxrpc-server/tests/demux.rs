use muxrpc_core::{
    dial,
    proto::{Req, Resp, simple_client::SimpleClient},
    types::RpcType,
};
use muxrpc_server::server::{
    config::ServerConfig,
    lifecycle::{RunningServer, Server},
};
use std::{
    io::Write,
    sync::{Arc, Mutex},
};
use tokio::{io::AsyncReadExt, net::TcpStream};
use tokio_stream::StreamExt;
use tonic_health::pb::{
    HealthCheckRequest, health_check_response::ServingStatus, health_client::HealthClient,
};

async fn start(name: &str, dc: &str) -> RunningServer {
    Server::new(ServerConfig::new(name, dc))
        .start()
        .await
        .unwrap()
}

fn resp(server_name: &str, datacenter: &str) -> Resp {
    Resp {
        server_name: server_name.to_string(),
        datacenter: datacenter.to_string(),
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn tagged_client_reaches_both_calls() {
    let server = start("one-server", "dc1").await;
    let channel = dial::connect(server.local_addr()).await.unwrap();
    let mut client = SimpleClient::new(channel);

    let unary = client.something(Req::default()).await.unwrap().into_inner();
    assert_eq!(unary, resp("one-server", "dc1"));

    let stream = client.flow(Req::default()).await.unwrap().into_inner();
    let flow: Vec<Resp> = stream.map(Result::unwrap).collect().await;
    assert_eq!(flow, [resp("one", "dc1"), resp("two", "dc1")]);

    assert_eq!(server.stats().forwarded, 1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn repeated_flows_on_one_connection() {
    let server = start("one-server", "dc2").await;
    let mut client = SimpleClient::new(dial::connect(server.local_addr()).await.unwrap());

    for _ in 0..5 {
        let stream = client.flow(Req::default()).await.unwrap().into_inner();
        let names: Vec<String> = stream.map(|r| r.unwrap().server_name).collect().await;
        assert_eq!(names, ["one", "two"]);
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_tag_gets_eof_and_nothing_is_forwarded() {
    let server = start("one-server", "dc1").await;

    let mut conn = dial::open(server.local_addr(), RpcType::Unknown(0xff))
        .await
        .unwrap();
    let mut buf = [0_u8; 16];
    assert_eq!(conn.read(&mut buf).await.unwrap(), 0);

    let stats = server.stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.forwarded, 0);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn early_disconnect_is_counted_and_not_logged_as_unexpected() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let server = start("one-server", "dc1").await;
    drop(TcpStream::connect(server.local_addr()).await.unwrap());

    while server.stats().early_disconnects == 0 {
        tokio::task::yield_now().await;
    }

    let stats = server.stats();
    assert_eq!(stats.early_disconnects, 1);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.read_errors, 0);
    server.stop().await.unwrap();

    let output = logs.contents();
    assert!(output.contains("Peer closed before sending a tag byte"));
    assert!(!output.contains("unexpected tag byte"));
}

#[tokio::test]
async fn health_reports_serving() {
    let server = start("one-server", "dc1").await;
    let mut health = HealthClient::new(dial::connect(server.local_addr()).await.unwrap());

    let status = health
        .check(HealthCheckRequest {
            service: "testservice.Simple".to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .status;
    assert_eq!(status, ServingStatus::Serving as i32);

    drop(health);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn stop_while_connections_wait_for_their_tag() {
    let server = start("one-server", "dc1").await;
    let addr = server.local_addr();

    let mut pending = Vec::new();
    for _ in 0..8 {
        pending.push(TcpStream::connect(addr).await.unwrap());
    }
    while server.stats().accepted < 8 {
        tokio::task::yield_now().await;
    }

    server.stop().await.unwrap();

    for mut conn in pending {
        let mut buf = [0_u8; 1];
        assert_eq!(conn.read(&mut buf).await.unwrap(), 0);
    }
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn open_client_channels_drain_on_stop() {
    let server = start("one-server", "dc1").await;
    let channel = dial::connect(server.local_addr()).await.unwrap();
    let mut client = SimpleClient::new(channel.clone());
    client.something(Req::default()).await.unwrap();

    let stop = tokio::spawn(server.stop());
    drop(client);
    drop(channel);

    stop.await.unwrap().unwrap();
}
