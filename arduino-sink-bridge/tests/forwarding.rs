//! End-to-end forwarding tests against real transports.
//!
//! The gRPC tests run an in-process `Well` server on a loopback port.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use arduino_sink_bridge::config::{ArduinoBridgeConfig, SinkConfig};
use arduino_sink_bridge::pipeline::{Delivery, Forwarder, PipelineExit, PipelineOptions};
use arduino_sink_bridge::sink::{self, GrpcSink, Sink};
use arduino_sink_bridge::well::well_server::{Well, WellServer};
use arduino_sink_bridge::well::{WellTelemetryRequest, WellTelemetryResponse};
use serial_bridge_common::{Format, LocalMessage, TelemetryRecord, decode};
use serial_bridge_framework::{ConnectError, ConnectionState, Connector, OnTimeout, RetryPolicy};

/// `Well` service that echoes (or tampers with) the request hash.
#[derive(Clone, Default)]
struct TestWell {
    tamper: bool,
    received: Arc<Mutex<Vec<WellTelemetryRequest>>>,
}

impl TestWell {
    fn received(&self) -> Vec<WellTelemetryRequest> {
        self.received.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl Well for TestWell {
    async fn send_telemetry(
        &self,
        request: Request<WellTelemetryRequest>,
    ) -> Result<Response<WellTelemetryResponse>, Status> {
        let request = request.into_inner();
        let hash = if self.tamper {
            "tampered".to_string()
        } else {
            request.hash.clone()
        };
        self.received.lock().unwrap().push(request);
        Ok(Response::new(WellTelemetryResponse { hash }))
    }
}

async fn serve(well: TestWell, listener: TcpListener) {
    Server::builder()
        .add_service(WellServer::new(well))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
        .unwrap();
}

async fn start_server(well: TestWell) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(well, listener));
    addr
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::local()
        .with_retry_interval(Duration::from_millis(50))
        .with_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn test_grpc_echo_confirms_delivery() {
    let well = TestWell::default();
    let addr = start_server(well.clone()).await;

    let sink = GrpcSink::connect(&addr.to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    let mut forwarder = Forwarder::new(sink, PipelineOptions::default());

    let delivery = forwarder.forward_line("133|0.65|0.43").await.unwrap();
    assert_eq!(delivery, Delivery::Confirmed);

    let received = well.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].value, 133);
    assert_eq!(received[0].voltage, 0.65);
    assert_eq!(received[0].current, 0.43);
    assert_eq!(received[0].hash.len(), 28);
    assert!(received[0].timestamp.ends_with('Z'));
}

#[tokio::test]
async fn test_grpc_hash_is_computed_from_timestamp_and_line() {
    let well = TestWell::default();
    let addr = start_server(well.clone()).await;

    let sink = GrpcSink::connect(&format!("http://{}", addr), Duration::from_secs(1))
        .await
        .unwrap();
    let mut forwarder = Forwarder::new(sink, PipelineOptions::default());
    forwarder.forward_line("7|5.0|0.1").await.unwrap();

    let request = &well.received()[0];
    let expected = serial_bridge_common::fingerprint(&request.timestamp, "7|5.0|0.1");
    assert_eq!(request.hash, expected);
}

#[tokio::test]
async fn test_grpc_hash_mismatch_keeps_forwarding() {
    let well = TestWell {
        tamper: true,
        ..Default::default()
    };
    let addr = start_server(well.clone()).await;

    let sink = GrpcSink::connect(&addr.to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    let mut forwarder = Forwarder::new(sink, PipelineOptions::default());

    let first = forwarder.forward_line("1|1.0|1.0").await.unwrap();
    assert!(matches!(first, Delivery::Unconfirmed { ref received, .. } if received == "tampered"));

    let second = forwarder.forward_line("2|2.0|2.0").await.unwrap();
    assert!(matches!(second, Delivery::Unconfirmed { .. }));

    assert_eq!(well.received().len(), 2);
    assert_eq!(forwarder.stats().unconfirmed, 2);
}

#[tokio::test]
async fn test_grpc_connect_retries_until_server_is_up() {
    // Reserve a port, release it and bring the server up late
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let well = TestWell::default();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        serve(well, listener).await;
    });

    let config = ArduinoBridgeConfig {
        sink: SinkConfig::Grpc {
            address: addr.to_string(),
        },
        ..Default::default()
    };
    let mut connector = Connector::new(config.sink.describe(), fast_policy());

    let sink = sink::connect(&config, &mut connector).await.unwrap();

    assert_eq!(connector.state(), ConnectionState::Connected);
    assert!(connector.failures() >= 1);
    assert!(sink.describe().contains(&addr.port().to_string()));
}

#[tokio::test]
async fn test_pipeline_forwards_serial_lines_to_grpc() {
    let well = TestWell::default();
    let addr = start_server(well.clone()).await;

    let sink = GrpcSink::connect(&addr.to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    let forwarder = Forwarder::new(sink, PipelineOptions::default());
    let (_tx, shutdown) = watch::channel(false);
    let serial: &[u8] = b"10|1.0|0.1\r\nnoise\n11|1.1|0.2\r\n12|1.2|0.3\r\n";

    let exit = forwarder.run(BufReader::new(serial), shutdown).await;

    assert_eq!(exit, PipelineExit::StreamEnded);
    let values: Vec<i32> = well.received().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![10, 11, 12]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_sink_writes_local_messages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("well.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();

    let config = ArduinoBridgeConfig {
        sink: SinkConfig::Unix {
            path: path.display().to_string(),
        },
        ..Default::default()
    };
    let mut connector = Connector::new(config.sink.describe(), fast_policy());

    let (sink, accepted) = tokio::join!(sink::connect(&config, &mut connector), listener.accept());
    let mut sink = sink.unwrap();
    let (peer, _) = accepted.unwrap();

    let record = TelemetryRecord::parse("133|0.65|0.43", "|").unwrap();
    sink.send(&record).await.unwrap();
    sink.close().await;

    let mut line = String::new();
    BufReader::new(peer).read_line(&mut line).await.unwrap();

    let message: LocalMessage = decode(line.trim_end().as_bytes(), Format::Json).unwrap();
    assert_eq!(message, LocalMessage::from(&record));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_missing_with_fail_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.sock");

    let config = ArduinoBridgeConfig {
        sink: SinkConfig::Unix {
            path: path.display().to_string(),
        },
        ..Default::default()
    };
    let mut connector = Connector::new(
        config.sink.describe(),
        fast_policy().with_on_timeout(OnTimeout::Fail),
    );

    let result = sink::connect(&config, &mut connector).await;

    assert!(matches!(result, Err(ConnectError::TimedOut { .. })));
    assert_eq!(connector.state(), ConnectionState::Failed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_closes_socket_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("well.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();

    let config = ArduinoBridgeConfig {
        sink: SinkConfig::Unix {
            path: path.display().to_string(),
        },
        ..Default::default()
    };
    let mut connector = Connector::new(config.sink.describe(), fast_policy());
    let (sink, accepted) = tokio::join!(sink::connect(&config, &mut connector), listener.accept());
    let (peer, _) = accepted.unwrap();

    let forwarder = Forwarder::new(sink.unwrap(), PipelineOptions::default());
    let (tx, shutdown) = watch::channel(false);
    let (mut serial, reader) = tokio::io::duplex(256);
    let task = tokio::spawn(forwarder.run(BufReader::new(reader), shutdown));

    serial.write_all(b"1|1.0|1.0\n").await.unwrap();
    let mut peer = BufReader::new(peer);
    let mut line = String::new();
    peer.read_line(&mut line).await.unwrap();
    assert!(line.ends_with('\n'));

    tx.send(true).unwrap();
    assert_eq!(task.await.unwrap(), PipelineExit::Shutdown);

    // The sink shut down its write half
    line.clear();
    assert_eq!(peer.read_line(&mut line).await.unwrap(), 0);
}
