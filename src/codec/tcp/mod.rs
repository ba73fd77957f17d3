// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP

use super::*;

pub mod client;
pub use crate::frame::tcp::*;

// [MODBUS MESSAGING ON TCP/IP IMPLEMENTATION GUIDE V1.0b](http://modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf), page 5
// The length field counts the unit id and the PDU, a PDU is at most 253 bytes.
const MIN_LENGTH_FIELD: u16 = 2;
const MAX_LENGTH_FIELD: u16 = 1 + MAX_PDU_LEN as u16;

/// A decoded MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: TransactionId,
    pub length: u16,
    pub unit_id: UnitId,
}

impl MbapHeader {
    /// Number of bytes that follow the 7 byte header.
    ///
    /// The unit id is counted by the length field but belongs to the header.
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.length as usize - 1
    }
}

/// An extracted TCP PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
    pub pdu: &'a [u8],
}

/// Decode and validate the MBAP header at the start of `buf`.
pub fn decode_header(buf: &[u8]) -> Result<MbapHeader> {
    if buf.len() < MBAP_HEADER_LEN {
        return Err(Error::ShortHeader {
            received: buf.len(),
        });
    }
    let protocol_id = BigEndian::read_u16(&buf[2..4]);
    if protocol_id != PROTOCOL_ID {
        return Err(Error::ProtocolNotModbus(protocol_id));
    }
    let length = BigEndian::read_u16(&buf[4..6]);
    if !(MIN_LENGTH_FIELD..=MAX_LENGTH_FIELD).contains(&length) {
        return Err(Error::Length(length));
    }
    Ok(MbapHeader {
        transaction_id: BigEndian::read_u16(&buf[0..2]),
        length,
        unit_id: buf[6],
    })
}

/// Extract a complete PDU frame out of a buffer.
///
/// Bytes beyond the declared length are not part of the frame.
pub fn extract_frame(buf: &[u8]) -> Result<DecodedFrame<'_>> {
    let hdr = decode_header(buf)?;
    let expected = hdr.body_len();
    let received = buf.len() - MBAP_HEADER_LEN;
    if received < expected {
        return Err(Error::ShortBody { expected, received });
    }
    Ok(DecodedFrame {
        transaction_id: hdr.transaction_id,
        unit_id: hdr.unit_id,
        pdu: &buf[MBAP_HEADER_LEN..MBAP_HEADER_LEN + expected],
    })
}
