//! LLCP service descriptors
//!
//! This module contains the application-level endpoint descriptor and
//! the handler interface through which a service supplies its
//! per-connection behavior.

use std::fmt;
use std::sync::Arc;

use crate::connection::LlcConnection;
use crate::{Result, LLCP_DEFAULT_MIU, LLCP_DEFAULT_RW};

/// Decision returned by a service when a new connection is admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// Accept the connection; the worker then waits for the data
    /// transfer phase and runs the service routine.
    Accept,
    /// Decline the connection; the worker exits without running the
    /// service routine.
    Reject,
}

/// Per-connection behavior supplied by a service
///
/// The worker signals its decision exactly once through the return
/// value of `on_admit`; implementations must not call
/// `LlcConnection::accept` or `reject` themselves.
pub trait ConnectionHandler: Send + Sync {
    /// Decide whether to admit an inbound data link connection
    fn on_admit(&self, _connection: &Arc<LlcConnection>) -> AdmitDecision {
        AdmitDecision::Accept
    }

    /// Service routine, run once the connection reaches the data
    /// transfer phase
    fn run(&self, connection: Arc<LlcConnection>) -> Result<()>;
}

/// An application-level endpoint bound to a SAP
pub struct LlcService {
    uri: Option<String>,
    sap: Option<u8>,
    rw: u8,
    miu: u16,
    handler: Arc<dyn ConnectionHandler>,
}

impl LlcService {
    /// Create a new anonymous service
    pub fn new(handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            uri: None,
            sap: None,
            rw: LLCP_DEFAULT_RW,
            miu: LLCP_DEFAULT_MIU,
            handler,
        }
    }

    /// Create a new service advertised under a URI
    pub fn with_uri(handler: Arc<dyn ConnectionHandler>, uri: &str) -> Self {
        Self {
            uri: Some(uri.to_string()),
            ..Self::new(handler)
        }
    }

    /// Get the service URI
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Set the service URI
    pub fn set_uri(&mut self, uri: &str) {
        self.uri = Some(uri.to_string());
    }

    /// Get the advertised MIU
    pub fn miu(&self) -> u16 {
        self.miu
    }

    /// Set the advertised MIU
    pub fn set_miu(&mut self, miu: u16) {
        self.miu = miu;
    }

    /// Get the advertised receive window
    pub fn rw(&self) -> u8 {
        self.rw
    }

    /// Set the advertised receive window (0-15)
    pub fn set_rw(&mut self, rw: u8) {
        self.rw = rw & 0x0f;
    }

    /// SAP the service is bound to, assigned at bind time
    pub fn sap(&self) -> Option<u8> {
        self.sap
    }

    pub(crate) fn set_sap(&mut self, sap: u8) {
        self.sap = Some(sap);
    }

    /// Get the connection handler
    pub fn handler(&self) -> Arc<dyn ConnectionHandler> {
        self.handler.clone()
    }
}

impl fmt::Debug for LlcService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlcService")
            .field("uri", &self.uri)
            .field("sap", &self.sap)
            .field("rw", &self.rw)
            .field("miu", &self.miu)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandler;

    impl ConnectionHandler for NullHandler {
        fn run(&self, _connection: Arc<LlcConnection>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_service_defaults() {
        let service = LlcService::new(Arc::new(NullHandler));
        assert_eq!(service.uri(), None);
        assert_eq!(service.sap(), None);
        assert_eq!(service.miu(), LLCP_DEFAULT_MIU);
        assert_eq!(service.rw(), LLCP_DEFAULT_RW);
    }

    #[test]
    fn test_service_with_uri() {
        let mut service = LlcService::with_uri(Arc::new(NullHandler), "urn:nfc:sn:snep");
        assert_eq!(service.uri(), Some("urn:nfc:sn:snep"));

        service.set_miu(1024);
        service.set_rw(0xf4); // only the low nibble is meaningful
        assert_eq!(service.miu(), 1024);
        assert_eq!(service.rw(), 4);
    }
}
