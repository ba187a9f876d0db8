/// Client Integration Tests
///
/// End-to-end runs through `HttpClient` with the loopback transport, plus the
/// raw `new_connection` future.

mod common;

use common::*;
use destpool::client::{HttpClient, LoopbackConnector, TokioExecutor};
use destpool::config::{ClientConfig, LoopbackConfig};
use destpool::{ConnectionRef, DestPoolError, ExchangeResult, Request, ResponseListener};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_test::{assert_pending, assert_ready};

struct Forward(mpsc::UnboundedSender<ExchangeResult>);

impl ResponseListener for Forward {
    fn on_complete(&self, result: &ExchangeResult) {
        let _ = self.0.send(result.clone());
    }
}

fn loopback_client(
    max_connections: usize,
    max_queue: usize,
    requests: Arc<RecordingRequestListener>,
) -> (Arc<HttpClient>, Arc<LoopbackConnector>) {
    let connector = Arc::new(LoopbackConnector::new(
        LoopbackConfig {
            connect_latency_ms: 2,
            exchange_latency_ms: 2,
            fail_connect: false,
        },
        Handle::current(),
    ));
    let client = HttpClient::builder(ClientConfig {
        max_connections_per_address: max_connections,
        max_queue_size_per_address: max_queue,
    })
    .name("test-client")
    .executor(Arc::new(TokioExecutor::current().unwrap()))
    .connector(connector.clone())
    .request_listener(requests)
    .build()
    .unwrap();
    (client, connector)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_routes_requests_per_destination() {
    let requests = Arc::new(RecordingRequestListener::default());
    let (client, connector) = loopback_client(2, 100, requests.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for i in 0..40 {
        let host = if i % 2 == 0 { "alpha.test" } else { "beta.test" };
        client
            .send(
                Arc::new(Request::new("http", host).with_path(format!("/{}", i))),
                Arc::new(Forward(tx.clone())),
            )
            .unwrap();
    }

    for _ in 0..40 {
        let result = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("exchange timed out")
            .unwrap();
        assert!(!result.is_failed());
    }

    assert_eq!(requests.queued.load(Ordering::SeqCst), 40);
    assert_eq!(client.destinations().len(), 2);
    assert!(connector.created() <= 4);
    for destination in client.destinations() {
        assert_eq!(destination.port(), 80);
        assert!(destination.connection_count() <= 2);
    }

    client.stop();
    assert!(client.destinations().is_empty());
}

#[tokio::test]
async fn client_stop_fails_queued_requests() {
    let requests = Arc::new(RecordingRequestListener::default());
    let (client, _connector) = loopback_client(1, 10, requests.clone());
    let listener = RecordingListener::new();

    for _ in 0..3 {
        client
            .send(Arc::new(Request::new("https", "slow.test")), listener.clone())
            .unwrap();
    }
    // Nothing has connected yet: the runtime has not been yielded to.
    client.stop();

    assert_eq!(listener.failures().len(), 3);
    assert_eq!(listener.completions().len(), 3);
    assert_eq!(requests.failures.lock().unwrap().len(), 3);

    let err = client
        .send(Arc::new(Request::new("https", "slow.test")), listener.clone())
        .unwrap_err();
    assert!(matches!(err, DestPoolError::Stopped { .. }));
    assert_eq!(err.to_string(), "test-client is stopped");
}

#[tokio::test]
async fn client_rejects_request_with_mismatched_port() {
    let (client, _connector) =
        loopback_client(1, 10, Arc::new(RecordingRequestListener::default()));
    let destination = client.destination("http", "example.com", None).unwrap();

    let err = destination
        .send(
            Arc::new(Request::new("http", "example.com").with_port(8080)),
            RecordingListener::new(),
        )
        .unwrap_err();

    assert!(matches!(err, DestPoolError::InvalidPort { port: 8080, .. }));
    assert!(!err.is_rejection());
    client.stop();
}

#[test]
fn new_connection_resolves_when_connector_completes() {
    let client = Arc::new(TestClient::new(
        1,
        1,
        Arc::new(ManualExecutor::default()),
        ConnectMode::Manual,
    ));
    let dest = destination(client.clone());

    let mut future = tokio_test::task::spawn(dest.new_connection());
    assert_pending!(future.poll());

    let conn: ConnectionRef = MockConnection::new(7);
    client.complete_next(conn.clone());

    assert!(future.is_woken());
    let connection = assert_ready!(future.poll()).unwrap();
    assert!(destpool::destination::same_connection(&connection, &conn));
    // Raw connections are neither pooled nor counted.
    assert_eq!(dest.connection_count(), 0);
    assert!(dest.connections().is_empty());
}

#[test]
fn new_connection_reports_connector_errors() {
    let client = Arc::new(TestClient::new(
        1,
        1,
        Arc::new(ManualExecutor::default()),
        ConnectMode::Manual,
    ));
    let dest = destination(client.clone());

    let mut refused = tokio_test::task::spawn(dest.new_connection());
    let mut abandoned = tokio_test::task::spawn(dest.new_connection());
    client.fail_next(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
    client.drop_pending();

    match assert_ready!(refused.poll()) {
        Err(DestPoolError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused),
        other => panic!("unexpected outcome {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        assert_ready!(abandoned.poll()),
        Err(DestPoolError::ConnectionFailed(_))
    ));
}
