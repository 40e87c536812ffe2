// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-Band Bytestreams (XEP-0047) turned into a reliable byte-stream
//! channel on top of a [`Session`].
//!
//! Base64 (de)coding of `<data/>` happens in
//! [`xmpp_parsers::ibb::Data`]'s own `FromXml`/`AsXml` implementation
//! (it uses [`xso::text::Base64`](xso::text::Base64) as its text codec), so
//! a malformed chunk never reaches this module as bytes: it fails to parse
//! as `Data` in the first place, and [`IbbManager::handle_iq`] turns that
//! parse failure into a `bad-request` reply before anything is appended to
//! a connection's read buffer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::time::Instant;

use jid::Jid;
use minidom::Element;
use xmpp_parsers::ibb::{Close, Data, Open, Stanza as Carrier, StreamId};
use xmpp_parsers::stanza_error::{DefinedCondition, ErrorType, StanzaError};

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::client::iq::IqRequest;
use crate::mux::{Handler, IqKind, IqOutcome, MuxBuilder};
use crate::session::Session;

const NS_IBB: &str = "http://jabber.org/protocol/ibb";

/// An error encountered by an IBB connection operation.
#[derive(Debug)]
pub enum IbbError {
    /// The peer rejected the request with this stanza error.
    Stanza(StanzaError),
    /// The connection was already closed.
    Closed,
    /// The deadline passed before the operation completed.
    Timeout,
    /// The session could not be used to send the request.
    Session(crate::Error),
}

impl From<crate::Error> for IbbError {
    fn from(e: crate::Error) -> Self {
        IbbError::Session(e)
    }
}

impl core::fmt::Display for IbbError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IbbError::Stanza(e) => write!(f, "peer rejected IBB request: {:?}", e),
            IbbError::Closed => write!(f, "IBB connection closed"),
            IbbError::Timeout => write!(f, "IBB operation timed out"),
            IbbError::Session(e) => write!(f, "session error: {}", e),
        }
    }
}

impl std::error::Error for IbbError {}

fn condition_error(cond: DefinedCondition, text: &str) -> StanzaError {
    StanzaError::new(ErrorType::Cancel, cond, "en", text)
}

/// Connection state shared between an [`IbbStream`] handle and the manager
/// that drives its receive side.
struct ConnState {
    peer: Option<Jid>,
    sid: StreamId,
    block_size: usize,
    carrier: Carrier,
    max_buffer: Option<usize>,
    read_buf: AsyncMutex<VecDeque<u8>>,
    read_notify: Notify,
    recv_seq: AsyncMutex<u16>,
    send_seq: AsyncMutex<Wrapping16>,
    write_buf: AsyncMutex<Vec<u8>>,
    closed: AtomicBool,
}

#[derive(Default)]
struct Wrapping16(u16);

impl Wrapping16 {
    fn next(&mut self) -> u16 {
        let cur = self.0;
        self.0 = self.0.wrapping_add(1);
        cur
    }
}

/// A live IBB connection, cheaply [`Clone`]able: clones share the same
/// underlying buffers.
pub struct IbbStream<Io> {
    state: Arc<ConnState>,
    session: Session<Io>,
}

impl<Io> Clone for IbbStream<Io> {
    fn clone(&self) -> Self {
        IbbStream {
            state: Arc::clone(&self.state),
            session: self.session.clone(),
        }
    }
}

impl<Io> IbbStream<Io>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
{
    /// The stream identifier negotiated for this connection.
    pub fn sid(&self) -> &str {
        &self.state.sid.0
    }

    /// The peer this connection is bound to.
    pub fn peer(&self) -> Option<&Jid> {
        self.state.peer.as_ref()
    }

    /// Read up to `buf.len()` bytes, blocking until at least one byte is
    /// available or the connection is closed.
    ///
    /// Returns `Ok(0)` at end-of-stream (connection closed with an empty
    /// buffer). `deadline`, if given, bounds how long this call may block.
    pub async fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize, IbbError> {
        let fut = self.read_inner(buf);
        match deadline {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| IbbError::Timeout)?,
            None => fut.await,
        }
    }

    async fn read_inner(&self, buf: &mut [u8]) -> Result<usize, IbbError> {
        loop {
            {
                let mut read_buf = self.state.read_buf.lock().await;
                if !read_buf.is_empty() {
                    let n = read_buf.len().min(buf.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = read_buf.pop_front().expect("checked non-empty");
                    }
                    return Ok(n);
                }
                if self.state.closed.load(Ordering::Acquire) {
                    return Ok(0);
                }
            }
            self.state.read_notify.notified().await;
        }
    }

    /// Write `data` into the block-size-bounded output buffer, flushing
    /// full blocks as they fill.
    pub async fn write(&self, data: &[u8]) -> Result<usize, IbbError> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(IbbError::Closed);
        }
        let mut buf = self.state.write_buf.lock().await;
        buf.extend_from_slice(data);
        while buf.len() >= self.state.block_size {
            let chunk: Vec<u8> = buf.drain(..self.state.block_size).collect();
            drop(buf);
            self.send_chunk(chunk).await?;
            buf = self.state.write_buf.lock().await;
        }
        Ok(data.len())
    }

    /// Flush any buffered bytes smaller than a full block.
    pub async fn flush(&self) -> Result<(), IbbError> {
        let mut buf = self.state.write_buf.lock().await;
        if buf.is_empty() {
            return Ok(());
        }
        let chunk: Vec<u8> = buf.drain(..).collect();
        drop(buf);
        self.send_chunk(chunk).await
    }

    async fn send_chunk(&self, chunk: Vec<u8>) -> Result<(), IbbError> {
        let seq = {
            let mut send_seq = self.state.send_seq.lock().await;
            send_seq.next()
        };
        let data = Data {
            seq,
            sid: self.state.sid.clone(),
            data: chunk,
        };
        let element: Element = data.into();
        match self.state.carrier {
            Carrier::Iq => {
                let resp = self
                    .session
                    .send_iq(self.state.peer.clone(), IqRequest::Set(element))
                    .await
                    .map_err(|e| IbbError::Session(session_iq_failure(e)))?;
                match resp {
                    crate::client::iq::IqResponse::Error(e) => Err(IbbError::Stanza(e)),
                    crate::client::iq::IqResponse::Result(_) => Ok(()),
                }
            }
            Carrier::Message => {
                let mut message =
                    xmpp_parsers::message::Message::new(self.state.peer.clone());
                message.payloads.push(element);
                self.session.send(message).await?;
                Ok(())
            }
        }
    }

    /// Flush remaining data and close the connection, notifying the peer.
    pub async fn close(&self) -> Result<(), IbbError> {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush().await?;
        let close = Close {
            sid: self.state.sid.clone(),
        };
        let element: Element = close.into();
        let resp = self
            .session
            .send_iq(self.state.peer.clone(), IqRequest::Set(element))
            .await
            .map_err(|e| IbbError::Session(session_iq_failure(e)))?;
        self.state.read_notify.notify_waiters();
        match resp {
            crate::client::iq::IqResponse::Error(e) => Err(IbbError::Stanza(e)),
            crate::client::iq::IqResponse::Result(_) => Ok(()),
        }
    }
}

fn session_iq_failure(e: crate::client::iq::IqFailure) -> crate::Error {
    match e {
        crate::client::iq::IqFailure::LostWorker => crate::Error::Disconnected,
        crate::client::iq::IqFailure::SendError(io) => crate::Error::Io(io),
    }
}

/// An inbound connection request pre-reserved via [`IbbManager::expect`], or
/// the live queue behind [`IbbManager::listen`].
pub struct IbbListener<Io> {
    address: Option<Jid>,
    accept_rx: mpsc::UnboundedReceiver<IbbStream<Io>>,
    manager: IbbManager<Io>,
}

impl<Io> IbbListener<Io>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
{
    /// Block until an inbound IBB open is accepted for this listener's
    /// address.
    pub async fn accept(&mut self) -> Option<IbbStream<Io>> {
        self.accept_rx.recv().await
    }

    /// Pre-reserve a specific `(peer, sid)` pair so an out-of-band
    /// negotiated session is matched deterministically, bypassing the
    /// ordinary accept queue. A concurrent `expect` for the same key
    /// cancels the prior call.
    pub async fn expect(&self, peer: Jid, sid: impl Into<String>) -> Result<IbbStream<Io>, IbbError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut listeners = self.manager.listeners.lock().await;
            let entry = listeners.entry(self.address.clone()).or_default();
            entry.expecting.insert((Some(peer), sid.into()), tx);
        }
        rx.await.map_err(|_| IbbError::Closed)
    }
}

#[derive(Default)]
struct ListenerState<Io> {
    accept_tx: Option<mpsc::UnboundedSender<IbbStream<Io>>>,
    expecting: HashMap<(Option<Jid>, String), oneshot::Sender<IbbStream<Io>>>,
}

/// Tracks open IBB connections and registered listeners for a [`Session`].
///
/// Register [`IbbManager::handler`] with a [`crate::mux::MuxBuilder`] to
/// wire inbound `open`/`data`/`close` requests into this manager.
pub struct IbbManager<Io> {
    session: Session<Io>,
    connections: Arc<AsyncMutex<HashMap<(Option<Jid>, String), Arc<ConnState>>>>,
    listeners: Arc<AsyncMutex<HashMap<Option<Jid>, ListenerState<Io>>>>,
    default_max_buffer: Option<usize>,
}

impl<Io> Clone for IbbManager<Io> {
    fn clone(&self) -> Self {
        IbbManager {
            session: self.session.clone(),
            connections: Arc::clone(&self.connections),
            listeners: Arc::clone(&self.listeners),
            default_max_buffer: self.default_max_buffer,
        }
    }
}

impl<Io> IbbManager<Io>
where
    Io: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    /// Create a manager bound to `session`. `default_max_buffer` bounds the
    /// read buffer of connections that don't specify their own; `None`
    /// means unbounded.
    pub fn new(session: Session<Io>, default_max_buffer: Option<usize>) -> Self {
        IbbManager {
            session,
            connections: Arc::new(AsyncMutex::new(HashMap::new())),
            listeners: Arc::new(AsyncMutex::new(HashMap::new())),
            default_max_buffer,
        }
    }

    /// Register this manager's IQ routes (`open`, `data`, `close`) with a
    /// [`MuxBuilder`].
    pub fn register(self: &Arc<Self>, builder: MuxBuilder) -> MuxBuilder
    where
        Io: 'static,
    {
        let handler: Arc<dyn Handler> = Arc::clone(self) as Arc<dyn Handler>;
        builder
            .with_iq(IqKind::Set, format!("{{{}}}open", NS_IBB), Arc::clone(&handler))
            .with_iq(IqKind::Set, format!("{{{}}}data", NS_IBB), Arc::clone(&handler))
            .with_iq(IqKind::Set, format!("{{{}}}close", NS_IBB), handler)
    }

    /// Open an outbound IBB connection to `peer`.
    pub async fn open(
        &self,
        peer: Jid,
        sid: impl Into<String>,
        block_size: u16,
        carrier: Carrier,
    ) -> Result<IbbStream<Io>, IbbError> {
        let sid = StreamId(sid.into());
        let open = Open {
            block_size,
            sid: sid.clone(),
            stanza: carrier.clone(),
        };
        let element: Element = open.into();
        let resp = self
            .session
            .send_iq(Some(peer.clone()), IqRequest::Set(element))
            .await
            .map_err(|e| IbbError::Session(session_iq_failure(e)))?;
        match resp {
            crate::client::iq::IqResponse::Error(e) => return Err(IbbError::Stanza(e)),
            crate::client::iq::IqResponse::Result(_) => {}
        }
        let state = Arc::new(ConnState {
            peer: Some(peer.clone()),
            sid: sid.clone(),
            block_size: block_size as usize,
            carrier,
            max_buffer: self.default_max_buffer,
            read_buf: AsyncMutex::new(VecDeque::new()),
            read_notify: Notify::new(),
            recv_seq: AsyncMutex::new(0),
            send_seq: AsyncMutex::new(Wrapping16::default()),
            write_buf: AsyncMutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.connections
            .lock()
            .await
            .insert((Some(peer), sid.0), Arc::clone(&state));
        Ok(IbbStream {
            state,
            session: self.session.clone(),
        })
    }

    /// A listener that receives inbound connections addressed to
    /// `address` (`None` for the wildcard listener).
    pub async fn listen(&self, address: Option<Jid>) -> IbbListener<Io> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.lock().await;
        let entry = listeners.entry(address.clone()).or_default();
        entry.accept_tx = Some(tx);
        IbbListener {
            address,
            accept_rx: rx,
            manager: self.clone(),
        }
    }

    async fn handle_open(&self, from: Option<Jid>, open: Open) -> IqOutcome {
        let key = (from.clone(), open.sid.0.clone());
        let mut listeners = self.listeners.lock().await;
        let listener = listeners
            .get_mut(&from)
            .or_else(|| listeners.get_mut(&None));
        let Some(listener) = listener else {
            return IqOutcome::Error(condition_error(
                DefinedCondition::NotAcceptable,
                "no listener registered for this peer",
            ));
        };
        let state = Arc::new(ConnState {
            peer: from.clone(),
            sid: open.sid.clone(),
            block_size: open.block_size as usize,
            carrier: open.stanza,
            max_buffer: self.default_max_buffer,
            read_buf: AsyncMutex::new(VecDeque::new()),
            read_notify: Notify::new(),
            recv_seq: AsyncMutex::new(0),
            send_seq: AsyncMutex::new(Wrapping16::default()),
            write_buf: AsyncMutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        let stream = IbbStream {
            state: Arc::clone(&state),
            session: self.session.clone(),
        };
        if let Some(tx) = listener.expecting.remove(&key) {
            let _ = tx.send(stream);
        } else if let Some(tx) = &listener.accept_tx {
            if tx.send(stream).is_err() {
                return IqOutcome::Error(condition_error(
                    DefinedCondition::NotAcceptable,
                    "listener no longer accepting connections",
                ));
            }
        } else {
            return IqOutcome::Error(condition_error(
                DefinedCondition::NotAcceptable,
                "no listener registered for this peer",
            ));
        }
        drop(listeners);
        self.connections.lock().await.insert(key, state);
        IqOutcome::Result(None)
    }

    async fn handle_data(&self, from: Option<Jid>, data: Data) -> IqOutcome {
        let key = (from, data.sid.0.clone());
        let connections = self.connections.lock().await;
        let Some(state) = connections.get(&key) else {
            return IqOutcome::Error(condition_error(
                DefinedCondition::ItemNotFound,
                "no such IBB stream",
            ));
        };
        let state = Arc::clone(state);
        drop(connections);

        let mut recv_seq = state.recv_seq.lock().await;
        if data.seq != *recv_seq {
            return IqOutcome::Error(condition_error(
                DefinedCondition::UnexpectedRequest,
                "out-of-order IBB sequence number",
            ));
        }
        *recv_seq = recv_seq.wrapping_add(1);
        drop(recv_seq);

        let mut read_buf = state.read_buf.lock().await;
        if let Some(max) = state.max_buffer {
            if read_buf.len() + data.data.len() > max {
                return IqOutcome::Error(condition_error(
                    DefinedCondition::ResourceConstraint,
                    "receive buffer full",
                ));
            }
        }
        read_buf.extend(data.data);
        drop(read_buf);
        state.read_notify.notify_waiters();
        IqOutcome::Result(None)
    }

    async fn handle_close(&self, from: Option<Jid>, close: Close) -> IqOutcome {
        let key = (from, close.sid.0.clone());
        let state = self.connections.lock().await.remove(&key);
        let Some(state) = state else {
            return IqOutcome::Error(condition_error(
                DefinedCondition::ItemNotFound,
                "no such IBB stream",
            ));
        };
        state.closed.store(true, Ordering::Release);
        state.read_notify.notify_waiters();
        IqOutcome::Result(None)
    }
}

#[async_trait]
impl<Io> Handler for IbbManager<Io>
where
    Io: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    async fn handle_iq(&self, from: Option<Jid>, payload: Element) -> Option<IqOutcome> {
        if payload.ns() != NS_IBB {
            return None;
        }
        match payload.name() {
            "open" => match Open::try_from(payload) {
                Ok(open) => Some(self.handle_open(from, open).await),
                Err(_) => Some(IqOutcome::Error(condition_error(
                    DefinedCondition::BadRequest,
                    "malformed IBB open request",
                ))),
            },
            "data" => match Data::try_from(payload) {
                Ok(data) => Some(self.handle_data(from, data).await),
                Err(_) => Some(IqOutcome::Error(condition_error(
                    DefinedCondition::BadRequest,
                    "malformed IBB data chunk",
                ))),
            },
            "close" => match Close::try_from(payload) {
                Ok(close) => Some(self.handle_close(from, close).await),
                Err(_) => Some(IqOutcome::Error(condition_error(
                    DefinedCondition::BadRequest,
                    "malformed IBB close request",
                ))),
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping16_wraps_after_max() {
        let mut seq = Wrapping16(u16::MAX);
        assert_eq!(seq.next(), u16::MAX);
        assert_eq!(seq.next(), 0);
    }
}
