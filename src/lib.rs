//! # LLCP data-link layer
//!
//! This is a Rust implementation of the NFC Forum Logical Link Control
//! Protocol (LLCP) data-link layer. LLCP multiplexes one physical NFC
//! peer-to-peer link into many application-addressable endpoints
//! (Service Access Points) and supports both connection-oriented data
//! link connections and connectionless logical data links.
//!
//! ## Architecture
//!
//! The implementation is organized into several modules:
//! - `pdu`: protocol data unit structures and codec
//! - `parameters`: TLV parameter codec (MIUX, RW, SN)
//! - `service`: service descriptors and connection handlers
//! - `link`: the LLC link, its SAP registries and outbound queue
//! - `connection`: connection admission, state machine and data transfer

pub mod connection;
pub mod link;
pub mod parameters;
pub mod pdu;
pub mod service;

// Re-export commonly used types
pub use crate::{
    connection::*,
    link::*,
    parameters::*,
    pdu::*,
    service::*,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlcpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No service available (DM reason 0x{reason:02x})")]
    ServiceNotFound { reason: u8 },

    #[error("SAP {0} is already in use")]
    SapInUse(u8),

    #[error("Out of resources: {0}")]
    NoResources(String),

    #[error("Buffer is full")]
    BufferFull,

    #[error("Channel is closed")]
    ChannelClosed,

    #[error("Worker error: {0}")]
    Worker(String),
}

impl LlcpError {
    /// DM reason code to report to the peer, for failures that map to one.
    ///
    /// Resource exhaustion deliberately maps to `None` so callers can tell
    /// it apart from a protocol-level rejection.
    pub fn dm_reason(&self) -> Option<u8> {
        match self {
            LlcpError::ServiceNotFound { reason } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlcpError>;

// Constants
pub const LLCP_VERSION_MAJOR: u8 = 1;
pub const LLCP_VERSION_MINOR: u8 = 1;

/// Base Maximum Information Unit every LLC must support.
pub const LLCP_DEFAULT_MIU: u16 = 128;
/// Default receive window when the peer advertises none.
pub const LLCP_DEFAULT_RW: u8 = 1;

/// Number of concurrent logical data links a link can carry.
pub const MAX_LOGICAL_DATA_LINK: usize = 8;
/// Highest addressable SAP.
pub const MAX_LLC_LINK_SERVICE: u8 = 0x3f;
/// Highest SAP in the SDP-advertised range.
pub const MAX_LLC_LINK_ADVERTISED_SERVICE: u8 = 0x1f;

pub const LINK_SERVICE_CLASS_1: u8 = 1;
pub const LINK_SERVICE_CLASS_2: u8 = 2;
pub const LINK_SERVICE_CLASS_3: u8 = LINK_SERVICE_CLASS_1 | LINK_SERVICE_CLASS_2;

// Well-known LLCP SAP values
pub const LLCP_SDP_SAP: u8 = 1;
pub const LLCP_IP_SAP: u8 = 2;
pub const LLCP_OBEX_SAP: u8 = 3;
pub const LLCP_SNEP_SAP: u8 = 4;

pub const LLCP_SDP_URI: &str = "urn:nfc:sn:sdp";
pub const LLCP_IP_URI: &str = "urn:nfc:sn:ip";
pub const LLCP_OBEX_URI: &str = "urn:nfc:sn:obex";
pub const LLCP_SNEP_URI: &str = "urn:nfc:sn:snep";

// Utility functions
pub fn init_logging() {
    env_logger::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(LLCP_DEFAULT_MIU, 128);
        assert_eq!(LLCP_DEFAULT_RW, 1);
        assert_eq!(MAX_LLC_LINK_SERVICE, 0x3f);
        assert_eq!(MAX_LOGICAL_DATA_LINK, 8);
        assert_eq!(LLCP_SDP_SAP, 1);
        assert_eq!(LLCP_SDP_URI, "urn:nfc:sn:sdp");
    }

    #[test]
    fn test_dm_reason_mapping() {
        let rejected = LlcpError::ServiceNotFound { reason: 0x02 };
        assert_eq!(rejected.dm_reason(), Some(0x02));

        let exhausted = LlcpError::NoResources("no free SAP".to_string());
        assert_eq!(exhausted.dm_reason(), None);
    }
}
