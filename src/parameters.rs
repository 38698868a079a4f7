//! LLCP connection parameters
//!
//! This module contains the TLV codec for the parameters exchanged
//! during connection setup: MIUX, RW and Service Name.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{LlcpError, Result, LLCP_DEFAULT_MIU};

/// MIU extension parameter tag
pub const PARAMETER_MIUX: u8 = 0x02;
/// Receive window parameter tag
pub const PARAMETER_RW: u8 = 0x05;
/// Service name parameter tag
pub const PARAMETER_SN: u8 = 0x06;

const MIUX_VALUE_LEN: usize = 2;
const RW_VALUE_LEN: usize = 1;
const MIUX_MASK: u16 = 0x07ff;

/// Decode a MIUX value field into the extension value (11 bits)
pub fn decode_miux(value: &[u8]) -> Result<u16> {
    if value.len() != MIUX_VALUE_LEN {
        return Err(LlcpError::Parse(format!(
            "Invalid MIUX parameter length: {}",
            value.len()
        )));
    }
    Ok(u16::from_be_bytes([value[0], value[1]]) & MIUX_MASK)
}

/// MIU announced by a MIUX extension value
pub fn miux_to_miu(miux: u16) -> u16 {
    LLCP_DEFAULT_MIU + (miux & MIUX_MASK)
}

/// Decode a RW value field into the receive window (0-15)
pub fn decode_rw(value: &[u8]) -> Result<u8> {
    if value.len() != RW_VALUE_LEN {
        return Err(LlcpError::Parse(format!(
            "Invalid RW parameter length: {}",
            value.len()
        )));
    }
    Ok(value[0] & 0x0f)
}

/// Decode a SN value field into a service name URI
///
/// The wire form is not NUL-terminated; the declared TLV length bounds
/// the copy.
pub fn decode_sn(value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| LlcpError::Parse("Service name is not valid UTF-8".to_string()))
}

/// Encode a service name URI as a SN TLV record, returning the bytes written
pub fn encode_sn(buf: &mut BytesMut, uri: &str) -> Result<usize> {
    if uri.len() > u8::MAX as usize {
        return Err(LlcpError::InvalidParameter(format!(
            "Service name of {} bytes does not fit a TLV record",
            uri.len()
        )));
    }
    buf.put_u8(PARAMETER_SN);
    buf.put_u8(uri.len() as u8);
    buf.put_slice(uri.as_bytes());
    Ok(2 + uri.len())
}

/// Parameters carried by a CONNECT (or CC) PDU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Peer MIU announced through MIUX, already including the 128 base
    pub miu: Option<u16>,
    /// Peer receive window
    pub rw: Option<u8>,
    /// Target service name
    pub sn: Option<String>,
}

impl ConnectParams {
    /// Decode a TLV parameter list
    ///
    /// The whole list fails on any truncated record, with no partial
    /// effects. Unknown tags are skipped by their declared length so a
    /// future parameter does not break connection setup.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut params = ConnectParams::default();
        let mut offset = 0usize;

        while offset < data.len() {
            if data.len() - offset < 2 {
                return Err(LlcpError::Parse(
                    "Incomplete TLV field in parameters list".to_string(),
                ));
            }
            let tag = data[offset];
            let length = data[offset + 1] as usize;
            if offset + 2 + length > data.len() {
                return Err(LlcpError::Parse(format!(
                    "Incomplete TLV value in parameters list (expected {} bytes but only {} left)",
                    length,
                    data.len() - offset - 2
                )));
            }
            let value = &data[offset + 2..offset + 2 + length];

            match tag {
                PARAMETER_MIUX => params.miu = Some(miux_to_miu(decode_miux(value)?)),
                PARAMETER_RW => params.rw = Some(decode_rw(value)?),
                PARAMETER_SN => params.sn = Some(decode_sn(value)?),
                other => {
                    log::debug!("Ignoring unknown TLV field 0x{:02x} (length: {})", other, length)
                }
            }

            offset += 2 + length;
        }

        Ok(params)
    }

    /// Encode the parameters as a TLV list
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        if let Some(miu) = self.miu {
            let miux = miu.saturating_sub(LLCP_DEFAULT_MIU) & MIUX_MASK;
            buf.put_u8(PARAMETER_MIUX);
            buf.put_u8(MIUX_VALUE_LEN as u8);
            buf.put_u16(miux);
        }
        if let Some(rw) = self.rw {
            buf.put_u8(PARAMETER_RW);
            buf.put_u8(RW_VALUE_LEN as u8);
            buf.put_u8(rw & 0x0f);
        }
        if let Some(sn) = &self.sn {
            encode_sn(&mut buf, sn)?;
        }
        Ok(buf.freeze())
    }
}
