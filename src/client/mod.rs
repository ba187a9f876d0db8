mod context;
pub mod loopback;

pub use context::{ClientContext, ConnectCallback, Connector, Task, TaskRunner, TokioExecutor};
pub use loopback::{LoopbackConnection, LoopbackConnector};

use crate::config::ClientConfig;
use crate::destination::Destination;
use crate::exchange::{Request, RequestListener, ResponseListener};
use crate::utils::error::{DestPoolError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Registry key of a destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

/// Port used when a request does not name one.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// HTTP client front end: owns the destinations and the shared executor,
/// connector and limits they run on.
pub struct HttpClient {
    name: String,
    config: ClientConfig,
    running: AtomicBool,
    executor: Arc<dyn TaskRunner>,
    connector: Arc<dyn Connector>,
    request_listeners: Vec<Arc<dyn RequestListener>>,
    destinations: DashMap<DestinationKey, Arc<Destination>>,
    me: Weak<HttpClient>,
}

impl HttpClient {
    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder {
            name: "HttpClient".to_string(),
            config,
            executor: None,
            connector: None,
            request_listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Destination for the triple, created on first use.
    pub fn destination(&self, scheme: &str, host: &str, port: Option<u16>) -> Result<Arc<Destination>> {
        let port = match port {
            Some(port) => port,
            None => default_port(scheme)
                .ok_or_else(|| DestPoolError::UnsupportedScheme(scheme.to_string()))?,
        };
        let key = DestinationKey {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        };

        if let Some(existing) = self.destinations.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        let client: Arc<dyn ClientContext> = self.me.upgrade().ok_or_else(|| {
            DestPoolError::Stopped {
                client: self.to_string(),
            }
        })?;
        let entry = self.destinations.entry(key).or_insert_with(|| {
            debug!("Creating destination {}://{}:{}", scheme, host, port);
            Arc::new(Destination::new(client, scheme, host, port))
        });
        Ok(Arc::clone(entry.value()))
    }

    /// Route `request` to its destination and queue it there.
    pub fn send(&self, request: Arc<Request>, listener: Arc<dyn ResponseListener>) -> Result<()> {
        if !self.is_running() {
            return Err(DestPoolError::Stopped {
                client: self.to_string(),
            });
        }
        let destination = self.destination(request.scheme(), request.host(), request.port())?;
        destination.send(request, listener)
    }

    /// Snapshot of the current destinations.
    pub fn destinations(&self) -> Vec<Arc<Destination>> {
        self.destinations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        info!("{} started", self);
    }

    /// Stop admitting requests and close every destination.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);

        // Collect first: closing runs listener callbacks, which may call back into the map.
        let destinations = self.destinations();
        self.destinations.clear();
        for destination in destinations {
            destination.close();
        }

        info!("{} stopped", self);
    }
}

impl ClientContext for HttpClient {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn executor(&self) -> Arc<dyn TaskRunner> {
        Arc::clone(&self.executor)
    }

    fn max_connections_per_address(&self) -> usize {
        self.config.max_connections_per_address
    }

    fn max_queue_size_per_address(&self) -> usize {
        self.config.max_queue_size_per_address
    }

    fn new_connection(&self, destination: &Arc<Destination>, callback: ConnectCallback) {
        self.connector.connect(destination, callback);
    }

    fn request_listeners(&self) -> Vec<Arc<dyn RequestListener>> {
        self.request_listeners.clone()
    }
}

impl fmt::Display for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub struct HttpClientBuilder {
    name: String,
    config: ClientConfig,
    executor: Option<Arc<dyn TaskRunner>>,
    connector: Option<Arc<dyn Connector>>,
    request_listeners: Vec<Arc<dyn RequestListener>>,
}

impl HttpClientBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn executor(mut self, executor: Arc<dyn TaskRunner>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn request_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.request_listeners.push(listener);
        self
    }

    /// Build a running client.
    ///
    /// Without an explicit executor the current tokio runtime is used.
    pub fn build(self) -> Result<Arc<HttpClient>> {
        self.config.validate()?;

        let connector = self
            .connector
            .ok_or_else(|| DestPoolError::Config("HttpClient requires a connector".to_string()))?;
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(TokioExecutor::current()?),
        };

        Ok(Arc::new_cyclic(|me| HttpClient {
            name: self.name,
            config: self.config,
            running: AtomicBool::new(true),
            executor,
            connector,
            request_listeners: self.request_listeners,
            destinations: DashMap::new(),
            me: me.clone(),
        }))
    }
}
