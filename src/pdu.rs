//! LLCP Protocol Data Units
//!
//! This module contains the PDU structures and the codec used to pack
//! and unpack them for the wire.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{LlcpError, Result, MAX_LLC_LINK_SERVICE};

/// Header length of an unsequenced PDU (DSAP/PTYPE/SSAP).
pub const PDU_HEADER_LEN: usize = 2;
/// Header length of a sequenced PDU (adds the N(S)/N(R) byte).
pub const PDU_SEQUENCED_HEADER_LEN: usize = 3;

// DM reason codes
/// The DISC PDU was received and the connection is now closed.
pub const DM_REASON_DISC_CONFIRMED: u8 = 0x00;
/// No active connection for the addressed SAP pair.
pub const DM_REASON_NO_CONNECTION: u8 = 0x01;
/// No service bound to the target SAP.
pub const DM_REASON_NO_SERVICE: u8 = 0x02;
/// The connection request was rejected by the service.
pub const DM_REASON_REJECTED: u8 = 0x03;

/// LLCP PDU types
///
/// The 16-value set is authoritative for the protocol layer; the
/// discriminants are the on-the-wire PTYPE values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PduType {
    /// Symmetry
    Symm = 0x00,
    /// Parameter Exchange
    Pax = 0x01,
    /// Aggregated Frame
    Agf = 0x02,
    /// Unnumbered Information
    Ui = 0x03,
    /// Connect
    Connect = 0x04,
    /// Disconnect
    Disc = 0x05,
    /// Connection Complete
    Cc = 0x06,
    /// Disconnected Mode
    Dm = 0x07,
    /// Frame Reject
    Frmr = 0x08,
    /// Service Name Lookup
    Snl = 0x09,
    /// Reserved
    Reserved0A = 0x0a,
    /// Reserved
    Reserved0B = 0x0b,
    /// Information
    I = 0x0c,
    /// Receive Ready
    Rr = 0x0d,
    /// Receive Not Ready
    Rnr = 0x0e,
    /// Reserved
    Reserved0F = 0x0f,
}

impl PduType {
    /// Parse PDU type from u8
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(PduType::Symm),
            0x01 => Ok(PduType::Pax),
            0x02 => Ok(PduType::Agf),
            0x03 => Ok(PduType::Ui),
            0x04 => Ok(PduType::Connect),
            0x05 => Ok(PduType::Disc),
            0x06 => Ok(PduType::Cc),
            0x07 => Ok(PduType::Dm),
            0x08 => Ok(PduType::Frmr),
            0x09 => Ok(PduType::Snl),
            0x0a => Ok(PduType::Reserved0A),
            0x0b => Ok(PduType::Reserved0B),
            0x0c => Ok(PduType::I),
            0x0d => Ok(PduType::Rr),
            0x0e => Ok(PduType::Rnr),
            0x0f => Ok(PduType::Reserved0F),
            _ => Err(LlcpError::Parse(format!("Invalid PDU type: {}", value))),
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get PDU type name
    pub fn name(&self) -> &'static str {
        match self {
            PduType::Symm => "SYMM",
            PduType::Pax => "PAX",
            PduType::Agf => "AGF",
            PduType::Ui => "UI",
            PduType::Connect => "CONNECT",
            PduType::Disc => "DISC",
            PduType::Cc => "CC",
            PduType::Dm => "DM",
            PduType::Frmr => "FRMR",
            PduType::Snl => "SNL",
            PduType::I => "I",
            PduType::Rr => "RR",
            PduType::Rnr => "RNR",
            PduType::Reserved0A | PduType::Reserved0B | PduType::Reserved0F => "RESERVED",
        }
    }

    /// Sequenced PDUs carry an N(S)/N(R) byte after the header
    pub fn has_sequence(&self) -> bool {
        matches!(self, PduType::I | PduType::Rr | PduType::Rnr)
    }
}

/// An LLCP protocol data unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pdu {
    /// Destination SAP
    pub dsap: u8,
    /// PDU type
    pub ptype: PduType,
    /// Source SAP
    pub ssap: u8,
    /// Send sequence number N(S), sequenced PDUs only
    pub ns: u8,
    /// Receive sequence number N(R), sequenced PDUs only
    pub nr: u8,
    /// Information field
    pub information: Bytes,
}

impl Pdu {
    /// Create a new PDU, validating the address and sequence ranges
    pub fn new(
        dsap: u8,
        ptype: PduType,
        ssap: u8,
        ns: u8,
        nr: u8,
        information: Bytes,
    ) -> Result<Self> {
        if dsap > MAX_LLC_LINK_SERVICE || ssap > MAX_LLC_LINK_SERVICE {
            return Err(LlcpError::InvalidParameter(format!(
                "SAP out of range (dsap: {}, ssap: {})",
                dsap, ssap
            )));
        }
        if ns > 0x0f || nr > 0x0f {
            return Err(LlcpError::InvalidParameter(format!(
                "Sequence number out of range (ns: {}, nr: {})",
                ns, nr
            )));
        }

        Ok(Self {
            dsap,
            ptype,
            ssap,
            ns,
            nr,
            information,
        })
    }

    /// Create a CONNECT PDU carrying an encoded parameter list
    pub fn connect(dsap: u8, ssap: u8, parameters: Bytes) -> Result<Self> {
        Self::new(dsap, PduType::Connect, ssap, 0, 0, parameters)
    }

    /// Create a CC PDU carrying an encoded parameter list
    pub fn cc(dsap: u8, ssap: u8, parameters: Bytes) -> Result<Self> {
        Self::new(dsap, PduType::Cc, ssap, 0, 0, parameters)
    }

    /// Create a DM PDU carrying a reason code
    pub fn dm(dsap: u8, ssap: u8, reason: u8) -> Result<Self> {
        Self::new(dsap, PduType::Dm, ssap, 0, 0, Bytes::copy_from_slice(&[reason]))
    }

    /// Create a UI PDU carrying a datagram payload
    pub fn ui(dsap: u8, ssap: u8, payload: Bytes) -> Result<Self> {
        Self::new(dsap, PduType::Ui, ssap, 0, 0, payload)
    }

    /// Create an I PDU carrying a sequenced information payload
    pub fn information(dsap: u8, ssap: u8, ns: u8, nr: u8, payload: Bytes) -> Result<Self> {
        Self::new(dsap, PduType::I, ssap, ns, nr, payload)
    }

    /// Get the size of the PDU when packed
    pub fn packed_len(&self) -> usize {
        let header = if self.ptype.has_sequence() {
            PDU_SEQUENCED_HEADER_LEN
        } else {
            PDU_HEADER_LEN
        };
        header + self.information.len()
    }

    /// Pack the PDU for the wire
    pub fn pack(&self) -> Bytes {
        let ptype = self.ptype.to_u8();
        let mut buf = BytesMut::with_capacity(self.packed_len());

        buf.put_u8(self.dsap << 2 | ptype >> 2);
        buf.put_u8((ptype & 0x03) << 6 | self.ssap);
        if self.ptype.has_sequence() {
            buf.put_u8(self.ns << 4 | self.nr);
        }
        buf.put_slice(&self.information);

        buf.freeze()
    }

    /// Unpack a PDU from wire bytes
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < PDU_HEADER_LEN {
            return Err(LlcpError::Parse(format!(
                "Insufficient data for PDU header ({} bytes)",
                data.len()
            )));
        }

        let dsap = data[0] >> 2;
        let ptype = PduType::from_u8((data[0] & 0x03) << 2 | data[1] >> 6)?;
        let ssap = data[1] & 0x3f;

        let (ns, nr, offset) = if ptype.has_sequence() {
            if data.len() < PDU_SEQUENCED_HEADER_LEN {
                return Err(LlcpError::Parse(format!(
                    "Missing sequence byte in {} PDU",
                    ptype.name()
                )));
            }
            (data[2] >> 4, data[2] & 0x0f, PDU_SEQUENCED_HEADER_LEN)
        } else {
            (0, 0, PDU_HEADER_LEN)
        };

        Ok(Self {
            dsap,
            ptype,
            ssap,
            ns,
            nr,
            information: Bytes::copy_from_slice(&data[offset..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_type_values() {
        assert_eq!(PduType::Symm.to_u8(), 0x00);
        assert_eq!(PduType::Ui.to_u8(), 0x03);
        assert_eq!(PduType::Connect.to_u8(), 0x04);
        assert_eq!(PduType::Dm.to_u8(), 0x07);
        assert_eq!(PduType::I.to_u8(), 0x0c);
        assert_eq!(PduType::Rnr.to_u8(), 0x0e);
        assert_eq!(PduType::from_u8(0x06).unwrap(), PduType::Cc);
        assert!(PduType::from_u8(0x10).is_err());
    }

    #[test]
    fn test_sequence_byte_only_for_numbered_types() {
        assert!(PduType::I.has_sequence());
        assert!(PduType::Rr.has_sequence());
        assert!(PduType::Rnr.has_sequence());
        assert!(!PduType::Connect.has_sequence());
        assert!(!PduType::Ui.has_sequence());
        assert!(!PduType::Symm.has_sequence());
    }

    #[test]
    fn test_pack_unpack_unsequenced() {
        let pdu = Pdu::connect(0x20, 0x21, Bytes::from_static(&[0x05, 0x01, 0x02])).unwrap();
        let packed = pdu.pack();
        assert_eq!(packed.len(), PDU_HEADER_LEN + 3);

        let unpacked = Pdu::unpack(&packed).unwrap();
        assert_eq!(unpacked.dsap, 0x20);
        assert_eq!(unpacked.ptype, PduType::Connect);
        assert_eq!(unpacked.ssap, 0x21);
        assert_eq!(unpacked.information, Bytes::from_static(&[0x05, 0x01, 0x02]));
    }

    #[test]
    fn test_pack_unpack_sequenced() {
        let pdu = Pdu::information(0x04, 0x20, 5, 9, Bytes::from_static(b"hello")).unwrap();
        let packed = pdu.pack();
        assert_eq!(packed.len(), PDU_SEQUENCED_HEADER_LEN + 5);

        let unpacked = Pdu::unpack(&packed).unwrap();
        assert_eq!(unpacked.ptype, PduType::I);
        assert_eq!(unpacked.ns, 5);
        assert_eq!(unpacked.nr, 9);
        assert_eq!(unpacked.information, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_unpack_short_buffer() {
        assert!(Pdu::unpack(&[]).is_err());
        assert!(Pdu::unpack(&[0x00]).is_err());

        // I PDU header without its sequence byte
        let pdu = Pdu::information(1, 2, 0, 0, Bytes::new()).unwrap();
        let packed = pdu.pack();
        assert!(Pdu::unpack(&packed[..2]).is_err());
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        assert!(Pdu::new(0x40, PduType::Symm, 0, 0, 0, Bytes::new()).is_err());
        assert!(Pdu::new(0, PduType::Symm, 0x40, 0, 0, Bytes::new()).is_err());
        assert!(Pdu::information(1, 2, 16, 0, Bytes::new()).is_err());
    }

    #[test]
    fn test_pdu_serde_round_trip() {
        let pdu = Pdu::information(0x04, 0x20, 2, 7, Bytes::from_static(b"payload")).unwrap();
        let json = serde_json::to_string(&pdu).unwrap();
        let back: Pdu = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pdu);
        assert_eq!(back.information, Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_dm_carries_reason() {
        let pdu = Pdu::dm(0x21, 0x01, DM_REASON_NO_SERVICE).unwrap();
        let unpacked = Pdu::unpack(&pdu.pack()).unwrap();
        assert_eq!(unpacked.information.as_ref(), &[0x02]);
    }
}
