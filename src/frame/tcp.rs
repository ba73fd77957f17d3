// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

pub type TransactionId = u16;
pub type UnitId = u8;

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default unit (slave) identifier.
pub const DEFAULT_UNIT_ID: UnitId = 0x01;

/// Size of the MBAP header including the unit id.
pub const MBAP_HEADER_LEN: usize = 7;

/// Protocol identifier of Modbus.
pub const PROTOCOL_ID: u16 = 0x0000;

/// Maximum size of a PDU.
pub const MAX_PDU_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAdu<'r> {
    pub hdr: Header,
    pub pdu: RequestPdu<'r>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseAdu<'r> {
    pub hdr: Header,
    pub pdu: ResponsePdu<'r>,
}
