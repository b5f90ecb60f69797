//! Asynchronous MQTT client engine.
//!
//! One connection owns a receive loop that routes inbound packets either to
//! the caller blocked on a matching request/response operation or into the
//! inbound message buffer, plus an optional pinger that keeps the session
//! alive. All writes to the transport go through a single serialized send
//! path.

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, OnceLock, PoisonError, RwLock,
    },
    time::Duration,
};

use futures::{SinkExt as _, StreamExt as _};
use mqtt3_codec::{
    common::{packet::EncodablePacket, qos::QoSWithPacketIdentifier, ConnectReturnCode,
        QualityOfService},
    packet::{
        DisconnectPacket, MqttDecoder, MqttEncoder, PingreqPacket, PublishPacket, SubackPacket,
        SubscribePacket, UnsubackPacket, UnsubscribePacket, VariablePacket, VariablePacketError,
    },
};
use tokio::{
    io::{AsyncWriteExt as _, ReadHalf, WriteHalf},
    sync::mpsc,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};
use url::Url;

pub use self::{
    error::{Error, SubscribeError, UnsubscribeError},
    options::{DisconnectedFn, Options, Param, PublishedFn, Will, DEFAULT_ADDR},
};
pub use crate::Message;

use crate::{
    backoff::Exp,
    transport::{self, AsyncStream},
    waitop::WaitOp,
};

pub mod error;
pub mod options;
mod ring;

type Reader = FramedRead<ReadHalf<Box<dyn AsyncStream>>, MqttDecoder>;
type Writer = FramedWrite<WriteHalf<Box<dyn AsyncStream>>, MqttEncoder>;

/// A topic filter to subscribe, with its requested QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub filter: String,
    pub qos: QualityOfService,
}

/// Handle to a connected MQTT session. Cheap to clone; all clones share the
/// same connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    param: Param,
    peer_addr: SocketAddr,

    // exactly one writer to the transport at any time
    writer: tokio::sync::Mutex<Option<Writer>>,
    packet_id: AtomicU32,

    // the protocol permits one in-flight operation of each of these
    ping_op: WaitOp<()>,
    subscribe_op: WaitOp<SubackPacket>,
    unsubscribe_op: WaitOp<UnsubackPacket>,
    // many QoS 1 publishes may be outstanding concurrently
    pending_publish: RwLock<HashMap<u16, Arc<WaitOp<()>>>>,

    ring: ring::MessageRing,
    publish_lock: tokio::sync::Mutex<()>,

    sent_tx: mpsc::Sender<()>,
    quit: CancellationToken,
    stopped: AtomicBool,
    derr: OnceLock<Error>,
}

impl Client {
    /// Connect to the broker named by `param.addr` and start the engine.
    pub async fn connect(param: Param) -> Result<Client, Error> {
        let options = param.options();
        let url = Url::parse(param.addr()).map_err(transport::Error::from)?;
        let connect_opts = transport::ConnectOptions {
            connect_timeout: options.connect_timeout,
            tls: options.tls.clone(),
            ws_origin: options.ws_origin.clone(),
        };
        let (stream, peer_addr) = transport::connect(&url, &connect_opts).await?;

        let (rd, wr) = tokio::io::split(stream);
        let mut reader = FramedRead::new(rd, MqttDecoder::new());
        let mut writer = FramedWrite::new(wr, MqttEncoder::new());

        let connect_packet = options.connect_packet(&param.id);
        if let Err(err) = writer.send(VariablePacket::from(connect_packet)).await {
            shutdown_stream(reader, writer).await;
            return Err(err.into());
        }

        match reader.next().await {
            Some(Ok(VariablePacket::ConnackPacket(packet))) => {
                match packet.connect_return_code() {
                    ConnectReturnCode::ConnectionAccepted => {}
                    code => {
                        shutdown_stream(reader, writer).await;
                        return Err(Error::ConnectRejected(code));
                    }
                }
            }
            Some(Ok(packet)) => {
                let name = packet.fixed_header().packet_type.to_string();
                shutdown_stream(reader, writer).await;
                return Err(Error::UnexpectedPacket(name));
            }
            Some(Err(err)) => {
                shutdown_stream(reader, writer).await;
                return Err(err.into());
            }
            None => {
                shutdown_stream(reader, writer).await;
                return Err(Error::ConnectionClosed);
            }
        }

        let (sent_tx, sent_rx) = mpsc::channel(1);
        let inner = Arc::new(ClientInner {
            param,
            peer_addr,
            writer: tokio::sync::Mutex::new(Some(writer)),
            packet_id: AtomicU32::new(1),
            ping_op: WaitOp::new(),
            subscribe_op: WaitOp::new(),
            unsubscribe_op: WaitOp::new(),
            pending_publish: RwLock::new(HashMap::new()),
            ring: ring::MessageRing::new(ring::DEFAULT_CAPACITY),
            publish_lock: tokio::sync::Mutex::new(()),
            sent_tx,
            quit: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            derr: OnceLock::new(),
        });

        tokio::spawn(recv_loop(inner.clone(), reader));
        if options.keep_alive > 0 && !options.disable_auto_keep_alive {
            tokio::spawn(keep_alive_loop(
                inner.clone(),
                sent_rx,
                options.keep_alive_interval(),
            ));
        }

        Ok(Client { inner })
    }

    /// Send a PINGREQ and wait for the PINGRESP.
    pub async fn ping(&self) -> Result<(), Error> {
        self.inner.ping().await
    }

    /// Subscribe to topics and validate the broker's grants against the
    /// request.
    pub async fn subscribe(&self, topics: &[Topic]) -> Result<(), Error> {
        self.inner.subscribe(topics).await
    }

    /// Unsubscribe from topic filters.
    pub async fn unsubscribe(&self, filters: &[String]) -> Result<(), Error> {
        self.inner.unsubscribe(filters).await
    }

    /// Publish a message. QoS 1 waits for the PUBACK; QoS 2 is not
    /// supported.
    pub async fn publish(
        &self,
        qos: QualityOfService,
        retain: bool,
        topic: &str,
        body: Vec<u8>,
    ) -> Result<(), Error> {
        self.inner.publish(qos, retain, topic, body).await
    }

    /// Take the next buffered inbound message. With `block` set this waits
    /// until one arrives; otherwise `None` is returned when the buffer is
    /// empty.
    pub async fn read(&self, block: bool) -> Result<Option<Message>, Error> {
        self.inner.ring.read(block).await
    }

    /// Shut down the session. Unless `force` is set, a DISCONNECT packet is
    /// sent first on a best-effort basis.
    pub async fn disconnect(&self, force: bool) -> Result<(), Error> {
        {
            let mut writer = self.inner.writer.lock().await;
            if let Some(writer) = writer.as_mut() {
                if !force {
                    // best effort farewell, send errors are swallowed
                    let _ = writer.send(DisconnectPacket::new()).await;
                }
            }
        }
        self.inner.stop(Error::Explicit).await;
        Ok(())
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }
}

impl ClientInner {
    async fn send_packet(&self, packet: VariablePacket) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => {
                writer.send(packet).await?;
                // coalesced reset signal for the pinger
                let _ = self.sent_tx.try_send(());
                Ok(())
            }
            None => Err(Error::ConnectionClosed),
        }
    }

    fn next_packet_id(&self) -> u16 {
        loop {
            let id = self.packet_id.fetch_add(1, Ordering::Relaxed) as u16;
            if id != 0 {
                return id;
            }
        }
    }

    async fn ping(&self) -> Result<(), Error> {
        self.ping_op
            .run(|| async { self.send_packet(PingreqPacket::new().into()).await })
            .await
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<(), Error> {
        if topics.is_empty() {
            return Err(Error::EmptyTopics);
        }
        let packet_id = self.next_packet_id();
        let subscribes: Vec<(String, QualityOfService)> = topics
            .iter()
            .map(|topic| (topic.filter.clone(), topic.qos))
            .collect();

        let suback = self
            .subscribe_op
            .run(|| async move {
                self.send_packet(SubscribePacket::new(packet_id, subscribes).into())
                    .await
            })
            .await?;

        let err = SubscribeError {
            mismatch_packet_id: suback.packet_identifier() != packet_id,
            mismatch_result_count: suback.return_codes().len() != topics.len(),
            requested: topics.iter().map(|topic| topic.qos).collect(),
            result: suback.return_codes().to_vec(),
        };
        if err.has_errors() {
            return Err(err.into());
        }
        Ok(())
    }

    async fn unsubscribe(&self, filters: &[String]) -> Result<(), Error> {
        if filters.is_empty() {
            return Err(Error::EmptyTopics);
        }
        let packet_id = self.next_packet_id();
        let filters = filters.to_vec();

        let unsuback = self
            .unsubscribe_op
            .run(|| async move {
                self.send_packet(UnsubscribePacket::new(packet_id, filters).into())
                    .await
            })
            .await?;

        if unsuback.packet_identifier() != packet_id {
            return Err(UnsubscribeError {
                mismatch_packet_id: true,
            }
            .into());
        }
        Ok(())
    }

    async fn publish(
        &self,
        qos: QualityOfService,
        retain: bool,
        topic: &str,
        body: Vec<u8>,
    ) -> Result<(), Error> {
        match qos {
            QualityOfService::Level0 => {
                let mut packet = PublishPacket::new(topic, QoSWithPacketIdentifier::Level0, body);
                packet.set_retain(retain);
                self.send_packet(packet.into()).await
            }
            QualityOfService::Level1 => {
                let packet_id = self.next_packet_id();
                let op = Arc::new(WaitOp::new());
                self.pending_publish_mut().insert(packet_id, op.clone());

                let mut packet =
                    PublishPacket::new(topic, QoSWithPacketIdentifier::Level1(packet_id), body);
                packet.set_retain(retain);
                let result = op
                    .run(|| async move { self.send_packet(packet.into()).await })
                    .await;

                self.pending_publish_mut().remove(&packet_id);
                result
            }
            QualityOfService::Level2 => Err(Error::UnsupportedQos),
        }
    }

    fn dispatch(self: &Arc<Self>, packet: VariablePacket) -> Result<(), Error> {
        match packet {
            VariablePacket::PublishPacket(packet) => self.proc_publish(&packet),
            VariablePacket::PubackPacket(packet) => {
                // unknown ids are ignored: the waiter may have timed out
                let op = {
                    let pending = self
                        .pending_publish
                        .read()
                        .unwrap_or_else(PoisonError::into_inner);
                    pending.get(&packet.packet_identifier()).cloned()
                };
                if let Some(op) = op {
                    let _ = op.fulfill(());
                }
                Ok(())
            }
            VariablePacket::SubackPacket(packet) => {
                let _ = self.subscribe_op.fulfill(packet);
                Ok(())
            }
            VariablePacket::UnsubackPacket(packet) => {
                let _ = self.unsubscribe_op.fulfill(packet);
                Ok(())
            }
            VariablePacket::PingrespPacket(_) => {
                let _ = self.ping_op.fulfill(());
                Ok(())
            }
            packet => Err(Error::UnexpectedPacket(
                packet.fixed_header().packet_type.to_string(),
            )),
        }
    }

    fn proc_publish(self: &Arc<Self>, packet: &PublishPacket) -> Result<(), Error> {
        if packet.qos() != QoSWithPacketIdentifier::Level0 {
            return Err(Error::UnsupportedQos);
        }
        let message = Message::from(packet);
        match &self.param.on_publish {
            Some(on_publish) => {
                let on_publish = on_publish.clone();
                let inner = self.clone();
                tokio::spawn(async move {
                    // callbacks never interleave within one connection
                    let _guard = inner.publish_lock.lock().await;
                    on_publish(message);
                });
            }
            None => self.ring.push(message),
        }
        Ok(())
    }

    async fn stop(&self, reason: Error) {
        // the first reason wins, later ones are discarded
        let _ = self.derr.set(reason);
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.quit.cancel();

        {
            let mut writer = self.writer.lock().await;
            if let Some(writer) = writer.take() {
                let mut half = writer.into_inner();
                let _ = half.shutdown().await;
            }
        }

        self.ping_op.close();
        self.subscribe_op.close();
        self.unsubscribe_op.close();
        let pending: Vec<Arc<WaitOp<()>>> =
            self.pending_publish_mut().drain().map(|(_, op)| op).collect();
        for op in pending {
            op.close();
        }

        self.ring.close();
    }

    fn pending_publish_mut(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<u16, Arc<WaitOp<()>>>> {
        self.pending_publish
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn shutdown_stream(reader: Reader, writer: Writer) {
    let mut stream = reader.into_inner().unsplit(writer.into_inner());
    let _ = stream.shutdown().await;
}

async fn recv_loop(inner: Arc<ClientInner>, mut reader: Reader) {
    let mut delay = Exp::with_min(Duration::from_millis(5));
    let mut reason = None;

    loop {
        tokio::select! {
            _ = inner.quit.cancelled() => break,
            packet = reader.next() => match packet {
                Some(Ok(packet)) => {
                    delay.reset();
                    log::debug!("client received packet: {packet:?}");
                    if let Err(err) = inner.dispatch(packet) {
                        reason = Some(err);
                        break;
                    }
                }
                Some(Err(VariablePacketError::IoError(err))) if is_transient(&err) => {
                    log::warn!("transient read error: {err}");
                    delay.wait().await;
                }
                Some(Err(err)) => {
                    reason = Some(err.into());
                    break;
                }
                None => {
                    reason = Some(Error::ConnectionClosed);
                    break;
                }
            }
        }
    }

    if let Some(err) = reason {
        inner.stop(err).await;
    }

    if let Some(on_disconnect) = &inner.param.on_disconnect {
        if let Some(reason) = inner.derr.get() {
            on_disconnect(reason, &inner.param);
        }
    }
}

async fn keep_alive_loop(inner: Arc<ClientInner>, mut sent_rx: mpsc::Receiver<()>, period: Duration) {
    loop {
        tokio::select! {
            _ = inner.quit.cancelled() => break,
            // a packet went out, re-arm the timer
            _ = sent_rx.recv() => continue,
            _ = tokio::time::sleep(period) => {
                match inner.ping().await {
                    Ok(()) | Err(Error::AlreadyInProgress) => {}
                    Err(Error::ConnectionClosed) | Err(Error::Terminated) => break,
                    Err(err) => {
                        log::warn!("auto keep alive ping failed: {err}");
                        break;
                    }
                }
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
