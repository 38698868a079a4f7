//! LLC link management
//!
//! This module contains the LLC link structure: one physical LLCP
//! peering, the three SAP registries it owns, and the outbound PDU
//! queue drained by the MAC driver.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::LlcConnection;
use crate::pdu::Pdu;
use crate::service::LlcService;
use crate::{
    LlcpError, Result, LINK_SERVICE_CLASS_3, LLCP_DEFAULT_MIU, LLCP_VERSION_MAJOR,
    LLCP_VERSION_MINOR, MAX_LLC_LINK_ADVERTISED_SERVICE, MAX_LLC_LINK_SERVICE,
    MAX_LOGICAL_DATA_LINK,
};

/// Depth of the link-level outbound PDU queue
pub const LINK_TX_QUEUE_DEPTH: usize = 16;

/// First SAP of the SDP-advertised range
const ADVERTISED_SAP_BASE: u8 = 0x10;

/// Default link timeout
const DEFAULT_LTO: Duration = Duration::from_millis(100);

/// LLC operating role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlcRole {
    /// This side initiated the MAC link activation
    Initiator,
    /// This side was activated by the peer
    Target,
}

impl LlcRole {
    /// Get role name
    pub fn name(&self) -> &'static str {
        match self {
            LlcRole::Initiator => "initiator",
            LlcRole::Target => "target",
        }
    }
}

/// Link activation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlcLinkStatus {
    Activated,
    Deactivated,
}

/// LLCP protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlcpVersion {
    pub major: u8,
    pub minor: u8,
}

impl LlcpVersion {
    /// Version implemented by this crate
    pub const LOCAL: LlcpVersion = LlcpVersion {
        major: LLCP_VERSION_MAJOR,
        minor: LLCP_VERSION_MINOR,
    };

    /// Run the version agreement procedure against a remote version
    ///
    /// Equal majors agree on the lower minor; differing majors cannot
    /// interoperate.
    pub fn agree(self, remote: LlcpVersion) -> Option<LlcpVersion> {
        if self.major == remote.major {
            Some(LlcpVersion {
                major: self.major,
                minor: self.minor.min(remote.minor),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Display for LlcpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// SAP selection for `LlcLink::bind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SapRequest {
    /// Lowest free SAP in the advertised range (0x10-0x1f)
    Auto,
    /// An explicit SAP
    Sap(u8),
}

/// The three registries owned by a link, guarded by one lock
///
/// A `transmission` entry is non-empty iff exactly one live connection
/// claims it; entries are released only by that connection's teardown.
#[derive(Debug)]
pub(crate) struct LinkTables {
    pub(crate) services: Vec<Option<Arc<LlcService>>>,
    pub(crate) transmission: Vec<Option<Arc<LlcConnection>>>,
    pub(crate) datagrams: Vec<Option<Arc<LlcConnection>>>,
}

/// Attributes negotiated with the peer during link activation
#[derive(Debug, Clone)]
struct LinkInfo {
    status: LlcLinkStatus,
    version: LlcpVersion,
    remote_miu: u16,
    remote_lto: Duration,
    remote_lsc: u8,
    remote_wks: u16,
}

/// One physical LLCP peering
#[derive(Debug)]
pub struct LlcLink {
    /// Operating role
    pub role: LlcRole,
    /// Local link MIU
    pub local_miu: u16,
    /// Local link timeout
    pub local_lto: Duration,
    /// Local link service class flags
    pub local_lsc: u8,
    info: Mutex<LinkInfo>,
    tables: Mutex<LinkTables>,
    tx_queue: SyncSender<Bytes>,
    rx_queue: Mutex<Receiver<Bytes>>,
    /// Link creation time
    pub created_at: DateTime<Utc>,
}

impl LlcLink {
    /// Create a new deactivated link
    pub fn new(role: LlcRole) -> Arc<Self> {
        let (tx_queue, rx_queue) = sync_channel(LINK_TX_QUEUE_DEPTH);

        Arc::new(Self {
            role,
            local_miu: LLCP_DEFAULT_MIU,
            local_lto: DEFAULT_LTO,
            local_lsc: LINK_SERVICE_CLASS_3,
            info: Mutex::new(LinkInfo {
                status: LlcLinkStatus::Deactivated,
                version: LlcpVersion::LOCAL,
                remote_miu: LLCP_DEFAULT_MIU,
                remote_lto: DEFAULT_LTO,
                remote_lsc: LINK_SERVICE_CLASS_3,
                remote_wks: 0x0001,
            }),
            tables: Mutex::new(LinkTables {
                services: vec![None; MAX_LLC_LINK_SERVICE as usize + 1],
                transmission: vec![None; MAX_LLC_LINK_SERVICE as usize + 1],
                datagrams: vec![None; MAX_LOGICAL_DATA_LINK],
            }),
            tx_queue,
            rx_queue: Mutex::new(rx_queue),
            created_at: Utc::now(),
        })
    }

    /// Get the link activation status
    pub fn status(&self) -> LlcLinkStatus {
        self.info.lock().unwrap().status
    }

    /// Mark the link activated
    pub fn activate(&self) {
        log::info!("Link activated ({})", self.role.name());
        self.info.lock().unwrap().status = LlcLinkStatus::Activated;
    }

    /// Deactivate the link and tear down every live connection
    pub fn deactivate(&self) {
        let connections: Vec<Arc<LlcConnection>> = {
            let mut tables = self.tables.lock().unwrap();
            let tables = &mut *tables;
            tables
                .transmission
                .iter_mut()
                .chain(tables.datagrams.iter_mut())
                .filter_map(|slot| slot.take())
                .collect()
        };

        for connection in &connections {
            connection.free();
        }

        self.info.lock().unwrap().status = LlcLinkStatus::Deactivated;
        log::info!(
            "Link deactivated, {} connection(s) torn down",
            connections.len()
        );
    }

    /// Get the agreed protocol version
    pub fn version(&self) -> LlcpVersion {
        self.info.lock().unwrap().version
    }

    /// Agree on a protocol version with the peer and record it
    pub fn version_agreement(&self, remote: LlcpVersion) -> Result<LlcpVersion> {
        match LlcpVersion::LOCAL.agree(remote) {
            Some(agreed) => {
                log::debug!("Version agreement: local {} remote {} -> {}",
                    LlcpVersion::LOCAL, remote, agreed);
                self.info.lock().unwrap().version = agreed;
                Ok(agreed)
            }
            None => Err(LlcpError::Protocol(format!(
                "Incompatible LLCP version {} (local is {})",
                remote,
                LlcpVersion::LOCAL
            ))),
        }
    }

    /// Get the peer's link MIU
    pub fn remote_miu(&self) -> u16 {
        self.info.lock().unwrap().remote_miu
    }

    /// Record the peer's link MIU
    pub fn set_remote_miu(&self, miu: u16) {
        self.info.lock().unwrap().remote_miu = miu;
    }

    /// Get the peer's well-known service bitmask
    pub fn remote_wks(&self) -> u16 {
        self.info.lock().unwrap().remote_wks
    }

    /// Record the peer's well-known service bitmask
    pub fn set_remote_wks(&self, wks: u16) {
        self.info.lock().unwrap().remote_wks = wks;
    }

    /// Get the peer's link timeout
    pub fn remote_lto(&self) -> Duration {
        self.info.lock().unwrap().remote_lto
    }

    /// Record the peer's link timeout
    pub fn set_remote_lto(&self, lto: Duration) {
        self.info.lock().unwrap().remote_lto = lto;
    }

    /// Get the peer's link service class flags
    pub fn remote_lsc(&self) -> u8 {
        self.info.lock().unwrap().remote_lsc
    }

    /// Record the peer's link service class flags
    pub fn set_remote_lsc(&self, lsc: u8) {
        self.info.lock().unwrap().remote_lsc = lsc;
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, LinkTables> {
        self.tables.lock().unwrap()
    }

    /// Bind a service to a SAP
    ///
    /// With `SapRequest::Auto`, the lowest free SAP in the advertised
    /// range is assigned. Returns the bound SAP.
    pub fn bind(&self, mut service: LlcService, request: SapRequest) -> Result<u8> {
        let mut tables = self.tables.lock().unwrap();

        let sap = match request {
            SapRequest::Sap(sap) => {
                if sap > MAX_LLC_LINK_SERVICE {
                    return Err(LlcpError::InvalidParameter(format!(
                        "SAP {} out of range",
                        sap
                    )));
                }
                if tables.services[sap as usize].is_some() {
                    return Err(LlcpError::SapInUse(sap));
                }
                sap
            }
            SapRequest::Auto => {
                let mut free = None;
                for sap in ADVERTISED_SAP_BASE..=MAX_LLC_LINK_ADVERTISED_SERVICE {
                    if tables.services[sap as usize].is_none() {
                        free = Some(sap);
                        break;
                    }
                }
                free.ok_or_else(|| {
                    LlcpError::NoResources("no free SAP in the advertised range".to_string())
                })?
            }
        };

        service.set_sap(sap);
        log::info!("Bound service {:?} to SAP {}", service.uri(), sap);
        tables.services[sap as usize] = Some(Arc::new(service));

        Ok(sap)
    }

    /// Unbind the service at a SAP
    ///
    /// Connections already admitted through it are unaffected.
    pub fn unbind(&self, sap: u8) {
        if sap > MAX_LLC_LINK_SERVICE {
            return;
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.services[sap as usize].take().is_some() {
            log::info!("Unbound service from SAP {}", sap);
        }
    }

    /// Get the service bound at a SAP
    pub fn service_at(&self, sap: u8) -> Option<Arc<LlcService>> {
        if sap > MAX_LLC_LINK_SERVICE {
            return None;
        }
        self.tables.lock().unwrap().services[sap as usize].clone()
    }

    /// Resolve a service name to the SAP it is bound at
    pub fn find_sap_by_uri(&self, uri: &str) -> Option<u8> {
        let tables = self.tables.lock().unwrap();
        tables
            .services
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .map(|service| service.uri() == Some(uri))
                    .unwrap_or(false)
            })
            .map(|sap| sap as u8)
    }

    /// Get the active data link connection registered at a SAP
    pub fn transmission_at(&self, sap: u8) -> Option<Arc<LlcConnection>> {
        if sap > MAX_LLC_LINK_SERVICE {
            return None;
        }
        self.tables.lock().unwrap().transmission[sap as usize].clone()
    }

    /// Get the active logical data link at a slot
    pub fn datagram_at(&self, slot: usize) -> Option<Arc<LlcConnection>> {
        if slot >= MAX_LOGICAL_DATA_LINK {
            return None;
        }
        self.tables.lock().unwrap().datagrams[slot].clone()
    }

    /// Number of live connections across both connection tables
    pub fn connection_count(&self) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.transmission.iter().filter(|s| s.is_some()).count()
            + tables.datagrams.iter().filter(|s| s.is_some()).count()
    }

    /// Hand a PDU to the MAC driver through the outbound queue
    ///
    /// Non-blocking; a full queue fails the send immediately.
    pub fn send_pdu(&self, pdu: &Pdu) -> Result<()> {
        log::debug!(
            "Queueing {} PDU [{} -> {}]",
            pdu.ptype.name(),
            pdu.ssap,
            pdu.dsap
        );
        match self.tx_queue.try_send(pdu.pack()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LlcpError::BufferFull),
            Err(TrySendError::Disconnected(_)) => Err(LlcpError::ChannelClosed),
        }
    }

    /// Take the next outbound PDU, blocking until one is queued
    ///
    /// This is the MAC driver's side of the outbound queue.
    pub fn pop_outbound(&self) -> Result<Bytes> {
        let rx = self.rx_queue.lock().unwrap();
        rx.recv().map_err(|_| LlcpError::ChannelClosed)
    }

    pub(crate) fn release_transmission(&self, sap: u8, id: Uuid) {
        if sap > MAX_LLC_LINK_SERVICE {
            return;
        }
        let mut tables = self.tables.lock().unwrap();
        let slot = &mut tables.transmission[sap as usize];
        if slot.as_ref().map(|conn| conn.id()) == Some(id) {
            *slot = None;
            log::debug!("Released transmission SAP {}", sap);
        }
    }

    pub(crate) fn release_datagram(&self, slot: usize, id: Uuid) {
        if slot >= MAX_LOGICAL_DATA_LINK {
            return;
        }
        let mut tables = self.tables.lock().unwrap();
        let entry = &mut tables.datagrams[slot];
        if entry.as_ref().map(|conn| conn.id()) == Some(id) {
            *entry = None;
            log::debug!("Released logical data link slot {}", slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ConnectionHandler, LlcService};
    use crate::pdu::PduType;

    struct NullHandler;

    impl ConnectionHandler for NullHandler {
        fn run(&self, _connection: Arc<LlcConnection>) -> Result<()> {
            Ok(())
        }
    }

    fn service() -> LlcService {
        LlcService::new(Arc::new(NullHandler))
    }

    #[test]
    fn test_link_creation() {
        let link = LlcLink::new(LlcRole::Target);
        assert_eq!(link.status(), LlcLinkStatus::Deactivated);
        assert_eq!(link.local_miu, LLCP_DEFAULT_MIU);
        assert_eq!(link.version(), LlcpVersion::LOCAL);
        assert_eq!(link.connection_count(), 0);

        link.activate();
        assert_eq!(link.status(), LlcLinkStatus::Activated);
    }

    #[test]
    fn test_bind_explicit_sap() {
        let link = LlcLink::new(LlcRole::Initiator);
        let sap = link.bind(service(), SapRequest::Sap(0x20)).unwrap();
        assert_eq!(sap, 0x20);
        assert!(link.service_at(0x20).is_some());
        assert_eq!(link.service_at(0x20).unwrap().sap(), Some(0x20));
    }

    #[test]
    fn test_bind_collision() {
        let link = LlcLink::new(LlcRole::Initiator);
        link.bind(service(), SapRequest::Sap(0x20)).unwrap();
        assert!(matches!(
            link.bind(service(), SapRequest::Sap(0x20)),
            Err(LlcpError::SapInUse(0x20))
        ));
    }

    #[test]
    fn test_bind_out_of_range() {
        let link = LlcLink::new(LlcRole::Initiator);
        assert!(link.bind(service(), SapRequest::Sap(0x40)).is_err());
    }

    #[test]
    fn test_bind_auto_assigns_lowest_free() {
        let link = LlcLink::new(LlcRole::Initiator);
        assert_eq!(link.bind(service(), SapRequest::Auto).unwrap(), 0x10);
        assert_eq!(link.bind(service(), SapRequest::Auto).unwrap(), 0x11);

        link.unbind(0x10);
        assert_eq!(link.bind(service(), SapRequest::Auto).unwrap(), 0x10);
    }

    #[test]
    fn test_find_sap_by_uri() {
        let link = LlcLink::new(LlcRole::Target);
        let svc = LlcService::with_uri(Arc::new(NullHandler), "urn:nfc:sn:snep");
        let sap = link.bind(svc, SapRequest::Sap(0x04)).unwrap();

        assert_eq!(link.find_sap_by_uri("urn:nfc:sn:snep"), Some(sap));
        assert_eq!(link.find_sap_by_uri("urn:nfc:sn:sdp"), None);
    }

    #[test]
    fn test_unbind_clears_slot() {
        let link = LlcLink::new(LlcRole::Target);
        link.bind(service(), SapRequest::Sap(0x12)).unwrap();
        link.unbind(0x12);
        assert!(link.service_at(0x12).is_none());
    }

    #[test]
    fn test_version_agreement() {
        assert_eq!(
            LlcpVersion::LOCAL.agree(LlcpVersion { major: 1, minor: 0 }),
            Some(LlcpVersion { major: 1, minor: 0 })
        );
        assert_eq!(
            LlcpVersion::LOCAL.agree(LlcpVersion { major: 1, minor: 9 }),
            Some(LlcpVersion::LOCAL)
        );
        assert_eq!(LlcpVersion::LOCAL.agree(LlcpVersion { major: 2, minor: 0 }), None);

        let link = LlcLink::new(LlcRole::Target);
        let agreed = link.version_agreement(LlcpVersion { major: 1, minor: 0 }).unwrap();
        assert_eq!(link.version(), agreed);
        assert!(link.version_agreement(LlcpVersion { major: 2, minor: 0 }).is_err());
    }

    #[test]
    fn test_send_pdu_reaches_outbound_queue() {
        let link = LlcLink::new(LlcRole::Initiator);
        let pdu = Pdu::new(0x01, PduType::Symm, 0x01, 0, 0, bytes::Bytes::new()).unwrap();
        link.send_pdu(&pdu).unwrap();

        let packed = link.pop_outbound().unwrap();
        let unpacked = Pdu::unpack(&packed).unwrap();
        assert_eq!(unpacked.ptype, PduType::Symm);
    }

    #[test]
    fn test_send_pdu_full_queue_fails_fast() {
        let link = LlcLink::new(LlcRole::Initiator);
        let pdu = Pdu::new(0x01, PduType::Symm, 0x01, 0, 0, bytes::Bytes::new()).unwrap();
        for _ in 0..LINK_TX_QUEUE_DEPTH {
            link.send_pdu(&pdu).unwrap();
        }
        assert!(matches!(link.send_pdu(&pdu), Err(LlcpError::BufferFull)));
    }
}
