//! Shared fixtures for destination tests: recording listeners, a manual
//! executor, a scripted client and mock connections.
#![allow(dead_code)]

use destpool::client::{ClientContext, ConnectCallback, Task, TaskRunner};
use destpool::{
    Connection, ConnectionRef, Destination, ExchangeError, ExchangeResult, Request,
    RequestListener, ResponseContext, ResponseListener,
};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum ResponseEvent {
    Failure(ExchangeError),
    Complete(ExchangeResult),
}

/// Response listener that records every callback.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ResponseEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ResponseEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<ExchangeError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResponseEvent::Failure(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<ExchangeResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResponseEvent::Complete(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

impl ResponseListener for RecordingListener {
    fn on_failure(&self, _response: &ResponseContext, failure: &ExchangeError) {
        self.events
            .lock()
            .unwrap()
            .push(ResponseEvent::Failure(failure.clone()));
    }

    fn on_complete(&self, result: &ExchangeResult) {
        self.events
            .lock()
            .unwrap()
            .push(ResponseEvent::Complete(result.clone()));
    }
}

/// Client-wide request listener counting queued and failed requests.
#[derive(Default)]
pub struct RecordingRequestListener {
    pub queued: AtomicUsize,
    pub failures: Mutex<Vec<ExchangeError>>,
}

impl RequestListener for RecordingRequestListener {
    fn on_queued(&self, _request: &Request) {
        self.queued.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _request: &Request, failure: &ExchangeError) {
        self.failures.lock().unwrap().push(failure.clone());
    }
}

/// Executor that only runs tasks when told to.
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualExecutor {
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Run queued tasks, including ones they schedule, and return how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.lock().unwrap().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl TaskRunner for ManualExecutor {
    fn execute(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }
}

/// Executor running every task on a fresh thread.
pub struct ThreadExecutor;

impl TaskRunner for ThreadExecutor {
    fn execute(&self, task: Task) {
        thread::spawn(task);
    }
}

/// Connection creation behaviour of a `TestClient`.
pub enum ConnectMode {
    /// Park callbacks until the test completes or fails them.
    Manual,
    /// Complete on a new thread with an auto-releasing `MockConnection`.
    Threaded { release_after: Duration },
}

/// `ClientContext` with scripted connection creation.
pub struct TestClient {
    pub running: AtomicBool,
    executor: Arc<dyn TaskRunner>,
    max_connections: usize,
    max_queue: usize,
    mode: ConnectMode,
    callbacks: Mutex<VecDeque<ConnectCallback>>,
    pub connects: AtomicUsize,
    request_listeners: Vec<Arc<dyn RequestListener>>,
}

impl TestClient {
    pub fn new(
        max_connections: usize,
        max_queue: usize,
        executor: Arc<dyn TaskRunner>,
        mode: ConnectMode,
    ) -> Self {
        Self {
            running: AtomicBool::new(true),
            executor,
            max_connections,
            max_queue,
            mode,
            callbacks: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            request_listeners: Vec::new(),
        }
    }

    pub fn with_request_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.request_listeners.push(listener);
        self
    }

    pub fn pending_connects(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    /// Complete the oldest pending connection attempt.
    pub fn complete_next(&self, connection: ConnectionRef) {
        let callback = self
            .callbacks
            .lock()
            .unwrap()
            .pop_front()
            .expect("no pending connection attempt");
        callback(Ok(connection));
    }

    /// Fail the oldest pending connection attempt.
    pub fn fail_next(&self, error: io::Error) {
        let callback = self
            .callbacks
            .lock()
            .unwrap()
            .pop_front()
            .expect("no pending connection attempt");
        callback(Err(error));
    }

    /// Drop pending callbacks without completing them.
    pub fn drop_pending(&self) {
        self.callbacks.lock().unwrap().clear();
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl fmt::Display for TestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestClient")
    }
}

impl ClientContext for TestClient {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn executor(&self) -> Arc<dyn TaskRunner> {
        Arc::clone(&self.executor)
    }

    fn max_connections_per_address(&self) -> usize {
        self.max_connections
    }

    fn max_queue_size_per_address(&self) -> usize {
        self.max_queue
    }

    fn new_connection(&self, destination: &Arc<Destination>, callback: ConnectCallback) {
        let id = self.connects.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        match self.mode {
            ConnectMode::Manual => self.callbacks.lock().unwrap().push_back(callback),
            ConnectMode::Threaded { release_after } => {
                let destination = Arc::downgrade(destination);
                thread::spawn(move || {
                    let connection: ConnectionRef =
                        MockConnection::auto_release(id, destination, release_after);
                    callback(Ok(connection));
                });
            }
        }
    }

    fn request_listeners(&self) -> Vec<Arc<dyn RequestListener>> {
        self.request_listeners.clone()
    }
}

/// Connection recording the requests it was asked to send.
pub struct MockConnection {
    id: u64,
    sent: Mutex<Vec<Arc<Request>>>,
    closed: AtomicBool,
    release: Option<(Weak<Destination>, Duration)>,
    me: Weak<MockConnection>,
    pub sends: AtomicU64,
}

impl MockConnection {
    pub fn new(id: u64) -> Arc<Self> {
        Self::build(id, None)
    }

    /// Connection that releases itself back to `destination` after each send.
    pub fn auto_release(id: u64, destination: Weak<Destination>, after: Duration) -> Arc<Self> {
        Self::build(id, Some((destination, after)))
    }

    fn build(id: u64, release: Option<(Weak<Destination>, Duration)>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            release,
            me: me.clone(),
            sends: AtomicU64::new(0),
        })
    }

    pub fn sent(&self) -> Vec<Arc<Request>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn send(&self, request: Arc<Request>, _listener: Arc<dyn ResponseListener>) {
        self.sent.lock().unwrap().push(request);
        self.sends.fetch_add(1, Ordering::SeqCst);

        if let Some((destination, after)) = &self.release {
            let destination = destination.clone();
            let after = *after;
            let me = self.me.clone();
            thread::spawn(move || {
                thread::sleep(after);
                if let (Some(destination), Some(me)) = (destination.upgrade(), me.upgrade()) {
                    let connection: ConnectionRef = me;
                    destination.release(&connection);
                }
            });
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockConnection#{}", self.id)
    }
}

pub fn request() -> Arc<Request> {
    Arc::new(Request::new("http", "example.com"))
}

pub fn destination(client: Arc<TestClient>) -> Arc<Destination> {
    Arc::new(Destination::new(client, "http", "example.com", 80))
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
