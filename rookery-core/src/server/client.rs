//! Per-connection state machine.
//!
//! Each accepted connection runs a receive loop (owning the read half), a
//! send loop draining a bounded queue into the write half, and, unless
//! disabled, an inactivity monitor armed from the keep-alive the client
//! advertised in its CONNECT.

use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::StreamExt as _;
use mqtt3_codec::{
    common::{qos::QoSWithPacketIdentifier, ConnectReturnCode, Encodable, QualityOfService},
    packet::{
        suback::SubscribeReturnCode, ConnackPacket, MqttDecoder, PingrespPacket, PubackPacket,
        PublishPacket, SubackPacket, UnsubackPacket, VariablePacket, VariablePacketError,
    },
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt as _, ReadHalf},
    sync::mpsc,
};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use super::{
    adapter::{ClientAdapter, PacketFilter, SubscribeTopic},
    error::{AdapterError, Error},
    ServerInner,
};
use crate::{backoff::Exp, Message};

/// Capacity of the per-client send queue.
const SEND_QUEUE_SIZE: usize = 16;

/// Capability handed to adapters for pushing packets to one client.
pub struct ClientHandle {
    sender: mpsc::Sender<VariablePacket>,
    remote_addr: SocketAddr,
    quit: CancellationToken,
    quited: AtomicBool,
}

impl ClientHandle {
    /// Queue a message for delivery to this client. Only QoS 0 is
    /// supported.
    pub fn publish(
        &self,
        qos: QualityOfService,
        retain: bool,
        topic: &str,
        body: &[u8],
    ) -> Result<(), Error> {
        match qos {
            QualityOfService::Level0 => {
                let mut packet =
                    PublishPacket::new(topic, QoSWithPacketIdentifier::Level0, body.to_vec());
                packet.set_retain(retain);
                self.send(packet.into())
            }
            _ => Err(Error::UnsupportedQos),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Disconnect the client.
    pub fn close(&self) {
        self.terminate();
    }

    pub(crate) fn send(&self, packet: VariablePacket) -> Result<(), Error> {
        self.sender.try_send(packet).map_err(|_| Error::SendQueue)
    }

    pub(crate) fn terminate(&self) {
        if self
            .quited
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.quit.cancel();
    }
}

pub(crate) async fn serve_client<S>(stream: S, remote_addr: SocketAddr, server: Arc<ServerInner>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (rd, wr) = tokio::io::split(stream);
    let mut reader = FramedRead::new(rd, MqttDecoder::new());
    let mut writer = wr;

    let packet = match reader.next().await {
        Some(Ok(VariablePacket::ConnectPacket(packet))) => packet,
        _ => {
            log::warn!("client#{remote_addr} first packet is not CONNECT packet");
            return;
        }
    };

    let (sq_tx, sq_rx) = mpsc::channel(SEND_QUEUE_SIZE);
    let quit = CancellationToken::new();
    let handle = Arc::new(ClientHandle {
        sender: sq_tx,
        remote_addr,
        quit: quit.clone(),
        quited: AtomicBool::new(false),
    });

    let session: Arc<dyn ClientAdapter> = match server.adapter.connect(&handle, &packet) {
        Ok(session) => Arc::from(session),
        Err(cerr) => {
            log::info!("client#{remote_addr} connect refused: {cerr}");
            let connack = ConnackPacket::new(false, cerr.return_code());
            let _ = write_packet(&mut writer, None, &connack.into()).await;
            return;
        }
    };

    let connack = ConnackPacket::new(
        session.is_session_present(),
        ConnectReturnCode::ConnectionAccepted,
    );
    if let Err(err) = write_packet(&mut writer, session.packet_filter(), &connack.into()).await {
        log::error!("client#{} write connect ack: {err}", session.id());
        server.adapter.disconnect(session.as_ref(), Some(&err));
        return;
    }

    let conn_id = server.register(handle.clone());

    let send_task = tokio::spawn(send_loop(writer, sq_rx, session.clone(), quit.clone()));

    let keep_alive = packet.keep_alive();
    let (mx_tx, mx_rx) = mpsc::channel(1);
    let monitor_task = if !server.options.disable_monitor && keep_alive > 0 {
        Some(tokio::spawn(monitor_loop(
            Duration::from_secs(keep_alive as u64),
            mx_rx,
            handle.clone(),
        )))
    } else {
        None
    };

    let result = recv_loop(&mut reader, &session, &handle, mx_tx).await;
    handle.terminate();

    if let Some(task) = monitor_task {
        let _ = task.await;
    }
    let _ = send_task.await;

    // the session leaves the registry before the adapter hears about it
    server.unregister(conn_id);
    server.adapter.disconnect(session.as_ref(), result.as_ref().err());
}

async fn recv_loop<T>(
    reader: &mut FramedRead<ReadHalf<T>, MqttDecoder>,
    session: &Arc<dyn ClientAdapter>,
    handle: &Arc<ClientHandle>,
    mx_tx: mpsc::Sender<()>,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite,
{
    let mut delay = Exp::with_min(Duration::from_millis(5));
    loop {
        tokio::select! {
            _ = handle.quit.cancelled() => return Ok(()),
            packet = reader.next() => match packet {
                Some(Ok(packet)) => {
                    delay.reset();
                    let _ = mx_tx.try_send(());
                    log::debug!("client#{} read packet: {packet:?}", session.id());
                    match process(session, handle, &packet) {
                        Ok(()) => continue,
                        Err(AdapterError::Disconnected) => {
                            handle.terminate();
                            return Ok(());
                        }
                        Err(err) if err.continuable() => {
                            log::warn!("client#{} adapter error: {err}", session.id());
                            continue;
                        }
                        Err(err) => {
                            handle.terminate();
                            return Err(err.into());
                        }
                    }
                }
                Some(Err(VariablePacketError::IoError(err))) if is_transient(&err) => {
                    log::warn!("client#{} transient read error: {err}", session.id());
                    delay.wait().await;
                }
                Some(Err(err)) => {
                    handle.terminate();
                    return Err(err.into());
                }
                None => {
                    handle.terminate();
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }
}

fn process(
    session: &Arc<dyn ClientAdapter>,
    handle: &Arc<ClientHandle>,
    packet: &VariablePacket,
) -> Result<(), AdapterError> {
    if let Some(filter) = session.packet_filter() {
        filter.pre_process(packet)?;
    }
    match packet {
        VariablePacket::DisconnectPacket(_) => {
            session.on_disconnect()?;
            Err(AdapterError::Disconnected)
        }
        VariablePacket::PingreqPacket(_) => {
            if session.on_ping()? {
                enqueue(handle, PingrespPacket::new().into())?;
            }
            Ok(())
        }
        VariablePacket::SubscribePacket(packet) => {
            let topics: Vec<SubscribeTopic> = packet
                .subscribes()
                .iter()
                .map(|(filter, qos)| SubscribeTopic {
                    filter: filter.clone(),
                    qos: *qos,
                })
                .collect();
            let granted = session.on_subscribe(&topics)?;

            // positions the adapter left unanswered are failures
            let mut results = vec![SubscribeReturnCode::Failure; topics.len()];
            for (slot, code) in results.iter_mut().zip(granted) {
                *slot = code;
            }
            enqueue(
                handle,
                SubackPacket::new(packet.packet_identifier(), results).into(),
            )
        }
        VariablePacket::UnsubscribePacket(packet) => {
            session.on_unsubscribe(packet.topic_filters())?;
            enqueue(
                handle,
                UnsubackPacket::new(packet.packet_identifier()).into(),
            )
        }
        VariablePacket::PublishPacket(packet) => {
            let message = Message::from(packet);
            match packet.qos() {
                QoSWithPacketIdentifier::Level0 => {
                    session.on_publish(&message)?;
                    Ok(())
                }
                QoSWithPacketIdentifier::Level1(packet_id) => {
                    session.on_publish(&message)?;
                    enqueue(handle, PubackPacket::new(packet_id).into())
                }
                QoSWithPacketIdentifier::Level2(_) => Err(AdapterError::NotSupported),
            }
        }
        VariablePacket::PubackPacket(_)
        | VariablePacket::PubrecPacket(_)
        | VariablePacket::PubrelPacket(_)
        | VariablePacket::PubcompPacket(_) => Err(AdapterError::NotSupported),
        _ => Err(AdapterError::NotAcceptable),
    }
}

fn enqueue(handle: &Arc<ClientHandle>, packet: VariablePacket) -> Result<(), AdapterError> {
    handle
        .send(packet)
        .map_err(|err| AdapterError::Fatal(err.to_string()))
}

async fn send_loop<W>(
    mut writer: W,
    mut sq_rx: mpsc::Receiver<VariablePacket>,
    session: Arc<dyn ClientAdapter>,
    quit: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = quit.cancelled() => break,
            packet = sq_rx.recv() => match packet {
                Some(packet) => {
                    if let Err(err) = write_packet(&mut writer, session.packet_filter(), &packet).await {
                        log::warn!("client#{} write failed: {err}", session.id());
                    }
                }
                None => break,
            }
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_packet<W>(
    writer: &mut W,
    filter: Option<&dyn PacketFilter>,
    packet: &VariablePacket,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let mut datagram = Vec::with_capacity(packet.encoded_length() as usize);
    packet.encode(&mut datagram)?;
    match filter {
        None => writer.write_all(&datagram).await?,
        Some(filter) => {
            let datagram = filter.pre_send(packet, datagram).map_err(Error::Adapter)?;
            writer.write_all(&datagram).await?;
            filter.post_send(packet, &datagram);
        }
    }
    writer.flush().await?;
    Ok(())
}

async fn monitor_loop(period: Duration, mut mx_rx: mpsc::Receiver<()>, handle: Arc<ClientHandle>) {
    loop {
        tokio::select! {
            _ = handle.quit.cancelled() => break,
            // inbound activity, re-arm the timer
            _ = mx_rx.recv() => continue,
            _ = tokio::time::sleep(period) => {
                log::info!("client#{} inactive, terminating", handle.remote_addr);
                handle.terminate();
                break;
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
