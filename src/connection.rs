//! LLCP connections
//!
//! This module contains the connection state machine, the admission
//! paths that construct connections from inbound and outbound requests,
//! and the per-connection data-transfer channel pair.

use std::cmp;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::link::LlcLink;
use crate::parameters::{encode_sn, ConnectParams};
use crate::pdu::{Pdu, PduType, DM_REASON_NO_SERVICE};
use crate::service::{AdmitDecision, ConnectionHandler};
use crate::{
    LlcpError, Result, LLCP_DEFAULT_MIU, LLCP_DEFAULT_RW, LLCP_SDP_SAP, MAX_LLC_LINK_SERVICE,
};

/// Depth of each per-connection data-transfer channel
pub const CONNECTION_QUEUE_DEPTH: usize = 2;

/// Worst-case PDU header overhead on a channel message
const PDU_OVERHEAD: usize = 3;

/// Data link connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DlcStatus {
    /// Initial and fully-terminal state
    Disconnected,
    /// Admitted, channels open, awaiting the service decision or the
    /// peer's confirmation
    New,
    /// Accepted by the service, awaiting peer-visible confirmation
    Accepted,
    /// Declined by the service; terminal for this instance
    Rejected,
    /// The peer's CC PDU was observed
    ReceivedCc,
    /// Data transfer phase
    Connected,
}

impl Default for DlcStatus {
    fn default() -> Self {
        DlcStatus::Disconnected
    }
}

impl DlcStatus {
    /// Get status name
    pub fn name(&self) -> &'static str {
        match self {
            DlcStatus::Disconnected => "DISCONNECTED",
            DlcStatus::New => "NEW",
            DlcStatus::Accepted => "ACCEPTED",
            DlcStatus::Rejected => "REJECTED",
            DlcStatus::ReceivedCc => "RECEIVED_CC",
            DlcStatus::Connected => "CONNECTED",
        }
    }

    /// States in which a connection is still waiting to reach the data
    /// transfer phase
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            DlcStatus::New | DlcStatus::Accepted | DlcStatus::ReceivedCc
        )
    }
}

/// Sequence number state of a data link connection
///
/// All values advance modulo 16. The core initializes them; advancing
/// V(SA)/V(RA) on acknowledgment is the PDU dispatcher's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    /// Send sequence V(S)
    pub vs: u8,
    /// Last acknowledged send sequence V(SA)
    pub vsa: u8,
    /// Receive sequence V(R)
    pub vr: u8,
    /// Last acknowledged receive sequence V(RA)
    pub vra: u8,
}

/// Which registry slot a connection occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    None,
    Transmission(u8),
    Datagram(usize),
}

#[derive(Debug)]
struct ConnState {
    status: DlcStatus,
    seq: SequenceState,
}

/// One data link connection or logical data link instance
pub struct LlcConnection {
    id: Uuid,
    link: Weak<LlcLink>,
    local_sap: u8,
    remote_sap: u8,
    service_sap: u8,
    remote_uri: Option<String>,
    local_miu: u16,
    remote_miu: u16,
    rwl: u8,
    rwr: u8,
    registration: Registration,
    handler: Arc<dyn ConnectionHandler>,
    state: Mutex<ConnState>,
    state_cv: Condvar,
    cancelled: AtomicBool,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
    up_name: String,
    down_name: String,
    up_tx: Mutex<Option<SyncSender<Bytes>>>,
    up_rx: Mutex<Option<Receiver<Bytes>>>,
    down_tx: Mutex<Option<SyncSender<Bytes>>>,
    down_rx: Mutex<Option<Receiver<Bytes>>>,
    created_at: DateTime<Utc>,
}

impl LlcConnection {
    fn new(
        link: &Arc<LlcLink>,
        local_sap: u8,
        remote_sap: u8,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        let id = Uuid::new_v4();
        let pid = std::process::id();

        Self {
            id,
            link: Arc::downgrade(link),
            local_sap,
            remote_sap,
            service_sap: local_sap,
            remote_uri: None,
            local_miu: LLCP_DEFAULT_MIU,
            remote_miu: LLCP_DEFAULT_MIU,
            rwl: LLCP_DEFAULT_RW,
            rwr: LLCP_DEFAULT_RW,
            registration: Registration::None,
            handler,
            state: Mutex::new(ConnState {
                status: DlcStatus::Disconnected,
                seq: SequenceState::default(),
            }),
            state_cv: Condvar::new(),
            cancelled: AtomicBool::new(false),
            worker: Mutex::new(None),
            up_name: format!("llcp-{}-{}-up", pid, id),
            down_name: format!("llcp-{}-{}-down", pid, id),
            up_tx: Mutex::new(None),
            up_rx: Mutex::new(None),
            down_tx: Mutex::new(None),
            down_rx: Mutex::new(None),
            created_at: Utc::now(),
        }
    }

    /// Admit an inbound data link connection from a received CONNECT PDU
    ///
    /// Decodes the parameter list, resolves the destination service
    /// (through SDP when the PDU targets the directory SAP and carries a
    /// service name), allocates a free local SAP scanning upward from the
    /// service SAP, registers the connection and opens its channel pair.
    ///
    /// Failures that the peer should learn about through a DM PDU carry a
    /// reason code (`LlcpError::dm_reason`); SAP exhaustion does not.
    pub fn accept_data_link_connection(link: &Arc<LlcLink>, pdu: &Pdu) -> Result<Arc<Self>> {
        let params = ConnectParams::decode(&pdu.information)?;
        let remote_miu = params.miu.unwrap_or(LLCP_DEFAULT_MIU);
        let remote_rw = params.rw.unwrap_or(LLCP_DEFAULT_RW);

        let mut service_sap = pdu.dsap;
        if let Some(sn) = &params.sn {
            if pdu.dsap == LLCP_SDP_SAP {
                service_sap = link.find_sap_by_uri(sn).ok_or(LlcpError::ServiceNotFound {
                    reason: DM_REASON_NO_SERVICE,
                })?;
            } else {
                log::warn!(
                    "Ignoring SN parameter (DSAP is {}, not {})",
                    pdu.dsap,
                    LLCP_SDP_SAP
                );
            }
        }

        let connection = {
            let mut tables = link.tables();

            let service = tables.services[service_sap as usize].clone().ok_or(
                LlcpError::ServiceNotFound {
                    reason: DM_REASON_NO_SERVICE,
                },
            )?;

            let mut local_sap = service_sap;
            while local_sap <= MAX_LLC_LINK_SERVICE
                && tables.transmission[local_sap as usize].is_some()
            {
                local_sap += 1;
            }
            if local_sap > MAX_LLC_LINK_SERVICE {
                return Err(LlcpError::NoResources(
                    "no free SAP for new Data Link Connection".to_string(),
                ));
            }

            let mut connection = Self::new(link, local_sap, pdu.ssap, service.handler());
            connection.service_sap = service_sap;
            connection.local_miu = service.miu();
            connection.remote_miu = remote_miu;
            connection.rwl = service.rw();
            connection.rwr = remote_rw;
            connection.registration = Registration::Transmission(local_sap);

            let connection = Arc::new(connection);
            tables.transmission[local_sap as usize] = Some(connection.clone());
            connection
        };

        connection.set_status(DlcStatus::New);
        if let Err(e) = connection.start() {
            connection.free();
            return Err(e);
        }
        if let Err(e) = connection.spawn_worker(true) {
            connection.free();
            return Err(e);
        }

        log::info!(
            "Data Link Connection [{} -> {}] admitted for service SAP {}",
            connection.local_sap,
            connection.remote_sap,
            service_sap
        );
        Ok(connection)
    }

    /// Create an outbound data link connection to an explicit remote SAP
    ///
    /// The connection is registered immediately so that peer replies can
    /// be matched; `connect` then performs the CONNECT exchange.
    pub fn open_data_link_connection(
        link: &Arc<LlcLink>,
        local_sap: u8,
        remote_sap: u8,
    ) -> Result<Arc<Self>> {
        Self::open_outgoing(link, local_sap, remote_sap, None)
    }

    /// Create an outbound data link connection to a named remote service
    ///
    /// The request targets the directory SAP; the peer resolves the URI.
    pub fn open_data_link_connection_by_uri(
        link: &Arc<LlcLink>,
        local_sap: u8,
        remote_uri: &str,
    ) -> Result<Arc<Self>> {
        Self::open_outgoing(link, local_sap, LLCP_SDP_SAP, Some(remote_uri.to_string()))
    }

    fn open_outgoing(
        link: &Arc<LlcLink>,
        local_sap: u8,
        remote_sap: u8,
        remote_uri: Option<String>,
    ) -> Result<Arc<Self>> {
        if local_sap > MAX_LLC_LINK_SERVICE {
            return Err(LlcpError::InvalidParameter(format!(
                "SAP {} out of range",
                local_sap
            )));
        }

        let connection = {
            let mut tables = link.tables();

            let service = tables.services[local_sap as usize].clone().ok_or_else(|| {
                LlcpError::InvalidState(format!("no service bound at SAP {}", local_sap))
            })?;
            if tables.transmission[local_sap as usize].is_some() {
                return Err(LlcpError::SapInUse(local_sap));
            }

            let mut connection = Self::new(link, local_sap, remote_sap, service.handler());
            connection.local_miu = service.miu();
            connection.rwl = service.rw();
            connection.remote_uri = remote_uri;
            connection.registration = Registration::Transmission(local_sap);

            let connection = Arc::new(connection);
            tables.transmission[local_sap as usize] = Some(connection.clone());
            connection
        };

        connection.set_status(DlcStatus::New);
        if let Err(e) = connection.start() {
            connection.free();
            return Err(e);
        }

        Ok(connection)
    }

    /// Admit an inbound logical data link from a received UI PDU
    ///
    /// No parameter negotiation occurs; the connection goes straight to
    /// the data transfer phase. When all slots are busy the datagram is
    /// dropped, not queued.
    pub fn accept_logical_data_link(link: &Arc<LlcLink>, pdu: &Pdu) -> Result<Arc<Self>> {
        let connection = {
            let mut tables = link.tables();

            let service = tables.services[pdu.dsap as usize].clone().ok_or(
                LlcpError::ServiceNotFound {
                    reason: DM_REASON_NO_SERVICE,
                },
            )?;

            let slot = match tables.datagrams.iter().position(|entry| entry.is_none()) {
                Some(slot) => slot,
                None => {
                    log::error!("No place left for new Logical Data Link");
                    return Err(LlcpError::NoResources(
                        "no free logical data link slot".to_string(),
                    ));
                }
            };

            let mut connection = Self::new(link, pdu.dsap, pdu.ssap, service.handler());
            connection.local_miu = service.miu();
            connection.rwl = service.rw();
            connection.registration = Registration::Datagram(slot);

            let connection = Arc::new(connection);
            tables.datagrams[slot] = Some(connection.clone());
            connection
        };

        // Datagram links have no connection handshake
        connection.set_status(DlcStatus::Connected);
        if let Err(e) = connection.start() {
            connection.free();
            return Err(e);
        }
        if let Err(e) = connection.spawn_worker(false) {
            connection.free();
            return Err(e);
        }

        log::info!(
            "Logical Data Link [{} -> {}] admitted",
            connection.local_sap,
            connection.remote_sap
        );
        Ok(connection)
    }

    /// Connection identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Local SAP of this connection
    pub fn local_sap(&self) -> u8 {
        self.local_sap
    }

    /// Remote SAP of this connection
    pub fn remote_sap(&self) -> u8 {
        self.remote_sap
    }

    /// SAP of the service that accepted the connection
    ///
    /// Differs from the local SAP for inbound connections routed through
    /// the directory service.
    pub fn service_sap(&self) -> u8 {
        self.service_sap
    }

    /// Remote service URI, for outbound by-name connections
    pub fn remote_uri(&self) -> Option<&str> {
        self.remote_uri.as_deref()
    }

    /// MIU this side can receive
    pub fn local_miu(&self) -> u16 {
        self.local_miu
    }

    /// MIU the peer can receive
    pub fn remote_miu(&self) -> u16 {
        self.remote_miu
    }

    /// Receive window advertised by this side
    pub fn local_rw(&self) -> u8 {
        self.rwl
    }

    /// Receive window advertised by the peer
    pub fn remote_rw(&self) -> u8 {
        self.rwr
    }

    /// Name of the link-to-application channel
    pub fn up_name(&self) -> &str {
        &self.up_name
    }

    /// Name of the application-to-link channel
    pub fn down_name(&self) -> &str {
        &self.down_name
    }

    /// Connection creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current connection status
    pub fn status(&self) -> DlcStatus {
        self.state.lock().unwrap().status
    }

    /// Current sequence number state
    pub fn sequence(&self) -> SequenceState {
        self.state.lock().unwrap().seq
    }

    /// Set the connection status and wake every waiter
    ///
    /// The PDU dispatcher drives the externally-observed transitions
    /// through this (CC receipt, data-transfer entry).
    pub fn set_status(&self, status: DlcStatus) {
        let mut state = self.state.lock().unwrap();
        if state.status != status {
            log::debug!(
                "Connection [{} -> {}] status: {} -> {}",
                self.local_sap,
                self.remote_sap,
                state.status.name(),
                status.name()
            );
            state.status = status;
        }
        self.state_cv.notify_all();
    }

    /// Open the data-transfer channel pair
    ///
    /// Idempotent; a connection whose channels are already open is left
    /// untouched.
    pub fn start(&self) -> Result<()> {
        let mut up_tx = self.up_tx.lock().unwrap();
        if up_tx.is_some() {
            return Ok(());
        }

        let (utx, urx) = sync_channel(CONNECTION_QUEUE_DEPTH);
        let (dtx, drx) = sync_channel(CONNECTION_QUEUE_DEPTH);
        *up_tx = Some(utx);
        *self.up_rx.lock().unwrap() = Some(urx);
        *self.down_tx.lock().unwrap() = Some(dtx);
        *self.down_rx.lock().unwrap() = Some(drx);

        log::debug!("Opened channel pair '{}' / '{}'", self.up_name, self.down_name);
        Ok(())
    }

    fn spawn_worker(self: &Arc<Self>, decide: bool) -> Result<()> {
        let connection = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("llcp-conn-{}", self.local_sap))
            .spawn(move || -> Result<()> {
                let handler = connection.handler.clone();
                if decide {
                    match handler.on_admit(&connection) {
                        AdmitDecision::Accept => connection.accept()?,
                        AdmitDecision::Reject => {
                            connection.reject()?;
                            return Ok(());
                        }
                    }
                }
                if connection.wait_connected() {
                    handler.run(connection)
                } else {
                    Ok(())
                }
            })?;

        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Block until the connection reaches the data transfer phase
    ///
    /// Returns false when the connection terminates or is cancelled
    /// instead.
    fn wait_connected(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            match state.status {
                DlcStatus::Connected => return true,
                status if status.is_pending() => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return false;
                    }
                    state = self.state_cv.wait(state).unwrap();
                }
                _ => return false,
            }
        }
    }

    /// Perform the CONNECT exchange for an outbound connection
    ///
    /// Encodes a SN parameter when the connection targets a named
    /// service. A failed send aborts before the worker is started, so no
    /// resources leak.
    pub fn connect(self: &Arc<Self>) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.status != DlcStatus::New {
                return Err(LlcpError::InvalidState(format!(
                    "cannot connect in state {}",
                    state.status.name()
                )));
            }
        }

        let link = self.link()?;
        let mut parameters = BytesMut::new();
        if let Some(uri) = &self.remote_uri {
            encode_sn(&mut parameters, uri)?;
        }
        let pdu = Pdu::connect(self.remote_sap, self.local_sap, parameters.freeze())?;
        link.send_pdu(&pdu)?;

        self.start()?;
        self.spawn_worker(false)
    }

    /// Accept the connection, entering the `Accepted` state
    ///
    /// Only valid while the connection is `New`; any other state is a
    /// caller error and fails loudly.
    pub fn accept(&self) -> Result<()> {
        self.decide(DlcStatus::Accepted, "accepted")
    }

    /// Decline the connection, entering the terminal `Rejected` state
    pub fn reject(&self) -> Result<()> {
        self.decide(DlcStatus::Rejected, "rejected")
    }

    fn decide(&self, to: DlcStatus, verb: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.status != DlcStatus::New {
            return Err(LlcpError::InvalidState(format!(
                "connection in state {} cannot be {}",
                state.status.name(),
                verb
            )));
        }
        log::info!(
            "Data Link Connection [{} -> {}] {}",
            self.local_sap,
            self.remote_sap,
            verb
        );
        state.status = to;
        self.state_cv.notify_all();
        Ok(())
    }

    /// Queue an already-built PDU on the down channel
    ///
    /// Only valid during the data transfer phase. The packed PDU must
    /// fit the channel's message bound of header plus remote MIU.
    pub fn send_pdu(&self, pdu: &Pdu) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state.status != DlcStatus::Connected {
            return Err(LlcpError::InvalidState(format!(
                "cannot send in state {}",
                state.status.name()
            )));
        }
        let bound = PDU_OVERHEAD + self.remote_miu as usize;
        if pdu.packed_len() > bound {
            return Err(LlcpError::InvalidParameter(format!(
                "packed PDU of {} bytes exceeds the channel bound of {}",
                pdu.packed_len(),
                bound
            )));
        }
        drop(state);
        self.enqueue_down(pdu.pack())
    }

    /// Package a payload into an I PDU and queue it on the down channel
    ///
    /// Non-blocking: a full channel fails with `BufferFull` immediately.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.status != DlcStatus::Connected {
            return Err(LlcpError::InvalidState(format!(
                "cannot send in state {}",
                state.status.name()
            )));
        }
        if data.len() > self.remote_miu as usize {
            return Err(LlcpError::InvalidParameter(format!(
                "payload of {} bytes exceeds remote MIU {}",
                data.len(),
                self.remote_miu
            )));
        }

        let pdu = Pdu::information(
            self.remote_sap,
            self.local_sap,
            state.seq.vs,
            state.seq.vr,
            Bytes::copy_from_slice(data),
        )?;
        self.enqueue_down(pdu.pack())?;
        state.seq.vs = (state.seq.vs + 1) & 0x0f;
        Ok(())
    }

    fn enqueue_down(&self, packed: Bytes) -> Result<()> {
        let guard = self.down_tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(LlcpError::ChannelClosed)?;
        match tx.try_send(packed) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LlcpError::BufferFull),
            Err(TrySendError::Disconnected(_)) => Err(LlcpError::ChannelClosed),
        }
    }

    /// Receive one information unit, blocking until one arrives
    ///
    /// The payload is copied into `buf`, truncated to its capacity if
    /// the unit is larger. Returns the number of bytes copied and the
    /// sending SAP.
    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, u8)> {
        let bytes = {
            let guard = self.up_rx.lock().unwrap();
            let rx = guard.as_ref().ok_or(LlcpError::ChannelClosed)?;
            rx.recv().map_err(|_| LlcpError::ChannelClosed)?
        };

        let pdu = Pdu::unpack(&bytes)?;
        let n = cmp::min(pdu.information.len(), buf.len());
        buf[..n].copy_from_slice(&pdu.information[..n]);

        if pdu.ptype == PduType::I {
            let mut state = self.state.lock().unwrap();
            state.seq.vr = (state.seq.vr + 1) & 0x0f;
        }

        Ok((n, pdu.ssap))
    }

    /// Deposit an inbound unit on the up channel
    ///
    /// This is the PDU dispatcher's side of the pair. Non-blocking; a
    /// full channel fails with `BufferFull` and the unit is dropped.
    pub fn push_inbound(&self, data: Bytes) -> Result<()> {
        if data.len() > PDU_OVERHEAD + self.local_miu as usize {
            return Err(LlcpError::Protocol(format!(
                "inbound unit of {} bytes exceeds local MIU {}",
                data.len(),
                self.local_miu
            )));
        }
        let guard = self.up_tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(LlcpError::ChannelClosed)?;
        match tx.try_send(data) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LlcpError::BufferFull),
            Err(TrySendError::Disconnected(_)) => Err(LlcpError::ChannelClosed),
        }
    }

    /// Take the next outbound unit, blocking until one is queued
    ///
    /// This is the PDU dispatcher's side of the down channel.
    pub fn pop_outbound(&self) -> Result<Bytes> {
        let guard = self.down_rx.lock().unwrap();
        let rx = guard.as_ref().ok_or(LlcpError::ChannelClosed)?;
        rx.recv().map_err(|_| LlcpError::ChannelClosed)
    }

    /// Stop the connection
    ///
    /// Cooperative: marks the connection disconnected and closes the
    /// channel senders so a worker blocked in `recv` observes the
    /// cancellation at its next suspension point. The worker is never
    /// forcibly terminated.
    pub fn stop(&self) {
        log::debug!(
            "Stopping connection [{} -> {}]",
            self.local_sap,
            self.remote_sap
        );
        self.cancelled.store(true, Ordering::SeqCst);
        self.set_status(DlcStatus::Disconnected);
        self.up_tx.lock().unwrap().take();
        self.down_tx.lock().unwrap().take();
    }

    /// Block until the connection reaches the data transfer phase, then
    /// join the worker and return its result
    ///
    /// Any terminal status observed while waiting fails instead.
    pub fn wait(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            loop {
                match state.status {
                    DlcStatus::Connected => break,
                    status if status.is_pending() => {
                        state = self.state_cv.wait(state).unwrap();
                    }
                    status => {
                        return Err(LlcpError::InvalidState(format!(
                            "connection terminated in state {}",
                            status.name()
                        )))
                    }
                }
            }
        }

        let handle = self
            .worker
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| LlcpError::InvalidState("no worker to join".to_string()))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(LlcpError::Worker("worker thread panicked".to_string())),
        }
    }

    /// Release the connection's resources
    ///
    /// Idempotent: closes both channels, detaches the worker and clears
    /// the registry slot this connection occupies. Does not notify the
    /// peer; sending a DISC PDU first is the caller's responsibility.
    pub fn free(&self) {
        log::debug!(
            "Freeing connection [{} -> {}]",
            self.local_sap,
            self.remote_sap
        );
        self.cancelled.store(true, Ordering::SeqCst);
        self.set_status(DlcStatus::Disconnected);

        self.up_tx.lock().unwrap().take();
        self.up_rx.lock().unwrap().take();
        self.down_tx.lock().unwrap().take();
        self.down_rx.lock().unwrap().take();
        self.worker.lock().unwrap().take();

        if let Some(link) = self.link.upgrade() {
            match self.registration {
                Registration::Transmission(sap) => link.release_transmission(sap, self.id),
                Registration::Datagram(slot) => link.release_datagram(slot, self.id),
                Registration::None => {}
            }
        }
    }

    fn link(&self) -> Result<Arc<LlcLink>> {
        self.link
            .upgrade()
            .ok_or_else(|| LlcpError::InvalidState("link is gone".to_string()))
    }
}

impl fmt::Debug for LlcConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlcConnection")
            .field("id", &self.id)
            .field("local_sap", &self.local_sap)
            .field("remote_sap", &self.remote_sap)
            .field("service_sap", &self.service_sap)
            .field("status", &self.status())
            .field("local_miu", &self.local_miu)
            .field("remote_miu", &self.remote_miu)
            .finish()
    }
}
