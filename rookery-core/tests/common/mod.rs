#![allow(dead_code)]

//! Shared fixtures: an in-process broker on an ephemeral port and a small
//! fan-out adapter that routes published messages between test clients.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use mqtt3_codec::packet::{suback::SubscribeReturnCode, ConnectPacket};
use rookery_core::{
    client::{Options, Param},
    server::{
        Adapter, AdapterError, ClientAdapter, ClientHandle, ConnectError, Error as ServerError,
        Server, ServerOptions, SubscribeTopic,
    },
    Message,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct TestBroker {
    pub server: Arc<Server>,
    pub addr: String,
    task: tokio::task::JoinHandle<()>,
}

pub async fn start_broker(adapter: Arc<dyn Adapter>, mut options: ServerOptions) -> TestBroker {
    init_logging();
    if options.addr.is_empty() {
        options.addr = "tcp://127.0.0.1:0".to_owned();
    }
    let server = Arc::new(Server::bind(adapter, options).await.expect("bind broker"));
    let addr = format!("tcp://{}", server.local_addr().expect("broker local addr"));
    let task = tokio::spawn({
        let server = server.clone();
        async move {
            server.serve().await.expect("broker serve failed");
        }
    });
    TestBroker { server, addr, task }
}

impl TestBroker {
    pub async fn stop(self) {
        self.server.close().await;
        let _ = self.task.await;
    }
}

pub fn client_param(addr: &str, id: &str, options: Options) -> Param {
    Param {
        addr: addr.to_owned(),
        id: id.to_owned(),
        options: Some(options),
        ..Default::default()
    }
}

/// Poll `cond` until it holds or the deadline passes.
pub async fn wait_for<F: Fn() -> bool>(cond: F, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Minimal topic filter match for routing between test clients. Supports
/// the `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(want), Some(got)) if want == got => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[derive(Default)]
struct Router {
    sessions: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    handle: Arc<ClientHandle>,
    filters: Vec<String>,
}

impl Router {
    fn insert(&self, id: String, handle: Arc<ClientHandle>) {
        self.sessions.lock().unwrap().insert(
            id,
            Entry {
                handle,
                filters: Vec::new(),
            },
        );
    }

    fn remove(&self, id: &str) {
        self.sessions.lock().unwrap().remove(id);
    }

    fn subscribe(&self, id: &str, filters: Vec<String>) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(id) {
            entry.filters.extend(filters);
        }
    }

    fn unsubscribe(&self, id: &str, filters: &[String]) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(id) {
            entry.filters.retain(|have| !filters.contains(have));
        }
    }

    fn dispatch(&self, src: &str, message: &Message) {
        let sessions = self.sessions.lock().unwrap();
        for (id, entry) in sessions.iter() {
            if id == src {
                continue;
            }
            if entry
                .filters
                .iter()
                .any(|filter| topic_matches(filter, &message.topic))
            {
                let _ = entry.handle.publish(
                    mqtt3_codec::common::QualityOfService::Level0,
                    message.retain,
                    &message.topic,
                    &message.body,
                );
            }
        }
    }
}

/// Broker policy for tests: fans every publish out to the other connected
/// clients whose filters match.
pub struct TestAdapter {
    router: Arc<Router>,
    pub ping_count: Arc<AtomicUsize>,
    max_grants: Option<usize>,
    reject: Option<ConnectError>,
}

impl TestAdapter {
    pub fn new() -> Self {
        Self {
            router: Arc::new(Router::default()),
            ping_count: Arc::new(AtomicUsize::new(0)),
            max_grants: None,
            reject: None,
        }
    }

    /// Grant at most `max` subscription entries per request.
    pub fn with_max_grants(max: usize) -> Self {
        Self {
            max_grants: Some(max),
            ..Self::new()
        }
    }

    /// Refuse every connection with the given error.
    pub fn rejecting(err: ConnectError) -> Self {
        Self {
            reject: Some(err),
            ..Self::new()
        }
    }
}

impl Adapter for TestAdapter {
    fn connect(
        &self,
        client: &Arc<ClientHandle>,
        packet: &ConnectPacket,
    ) -> Result<Box<dyn ClientAdapter>, ConnectError> {
        if let Some(err) = self.reject {
            return Err(err);
        }
        let id = packet.client_identifier().to_owned();
        self.router.insert(id.clone(), client.clone());
        Ok(Box::new(TestSession {
            id,
            router: self.router.clone(),
            ping_count: self.ping_count.clone(),
            max_grants: self.max_grants,
        }))
    }

    fn disconnect(&self, session: &dyn ClientAdapter, _err: Option<&ServerError>) {
        self.router.remove(session.id());
    }
}

struct TestSession {
    id: String,
    router: Arc<Router>,
    ping_count: Arc<AtomicUsize>,
    max_grants: Option<usize>,
}

impl ClientAdapter for TestSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_ping(&self) -> Result<bool, AdapterError> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn on_subscribe(
        &self,
        topics: &[SubscribeTopic],
    ) -> Result<Vec<SubscribeReturnCode>, AdapterError> {
        self.router.subscribe(
            &self.id,
            topics.iter().map(|topic| topic.filter.clone()).collect(),
        );
        let mut granted: Vec<SubscribeReturnCode> =
            topics.iter().map(|topic| topic.qos.into()).collect();
        if let Some(max) = self.max_grants {
            granted.truncate(max);
        }
        Ok(granted)
    }

    fn on_unsubscribe(&self, filters: &[String]) -> Result<(), AdapterError> {
        self.router.unsubscribe(&self.id, filters);
        Ok(())
    }

    fn on_publish(&self, message: &Message) -> Result<(), AdapterError> {
        self.router.dispatch(&self.id, message);
        Ok(())
    }
}
