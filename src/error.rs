// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;

use crate::frame::{Address, ExceptionResponse, FunctionCode, TransactionId};

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
///
/// Callers branch on the kind to decide whether to fix their input,
/// reconnect, or treat the outcome as a regular protocol answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request parameters are outside the protocol bounds. No I/O happened.
    Validation,
    /// Not connected, connecting failed or the connection broke.
    Connection,
    /// The response frame is incomplete or malformed.
    Framing,
    /// The response does not belong to the pending request.
    TransactionMismatch,
    /// The server answered with a Modbus exception.
    Exception,
    /// A write acknowledgement does not echo what was written.
    AckMismatch,
    /// The operation was aborted through its cancellation token.
    Cancelled,
}

/// modbus-tcp-master Error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid number of items
    #[error("Invalid quantity: {quantity} (allowed: 1..={max})")]
    Quantity { quantity: usize, max: u16 },

    /// Address range exceeds the 16 bit address space
    #[error("Address range overflow: start = {address}, quantity = {quantity}")]
    AddressOverflow { address: Address, quantity: usize },

    /// No connection has been established
    #[error("Not connected")]
    NotConnected,

    /// Establishing the TCP connection failed
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The peer closed the connection before sending a response
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A previous exchange left the byte stream in an unknown state
    #[error("Session desynchronized, reconnect required")]
    Desynchronized,

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// MBAP header read returned fewer bytes than required
    #[error("Incomplete header: received {received} of 7 byte(s)")]
    ShortHeader { received: usize },

    /// Frame body read returned fewer bytes than declared
    #[error("Incomplete frame: expected {expected} byte(s), received {received}")]
    ShortBody { expected: usize, received: usize },

    /// Invalid MBAP length field
    #[error("Invalid length field: {0}")]
    Length(u16),

    /// Protocol not Modbus
    #[error("Protocol not Modbus(0), received {0} instead")]
    ProtocolNotModbus(u16),

    /// The response echoes a different function code
    #[error("Unexpected function code: expected 0x{expected:0>2X}, received 0x{actual:0>2X}")]
    FnCode { expected: u8, actual: u8 },

    /// The response payload is too short for the requested data
    #[error("Truncated response: expected {expected} byte(s), received {received}")]
    Truncated { expected: usize, received: usize },

    /// The response belongs to another transaction
    #[error("Transaction id mismatch: expected {expected}, received {actual}")]
    TransactionMismatch {
        expected: TransactionId,
        actual: TransactionId,
    },

    /// Modbus exception response
    #[error("Modbus exception: {0}")]
    Exception(ExceptionResponse),

    /// Write acknowledgement does not match the request
    #[error(
        "Acknowledge mismatch ({function}): expected (0x{:0>4X}, 0x{:0>4X}), received (0x{:0>4X}, 0x{:0>4X})",
        .expected.0, .expected.1, .actual.0, .actual.1
    )]
    AckMismatch {
        function: FunctionCode,
        expected: (u16, u16),
        actual: (u16, u16),
    },

    /// The operation has been cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// The [`ErrorKind`] of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            Quantity { .. } | AddressOverflow { .. } => ErrorKind::Validation,
            NotConnected | Connect { .. } | ConnectionClosed | Desynchronized | Io(_) => {
                ErrorKind::Connection
            }
            ShortHeader { .. }
            | ShortBody { .. }
            | Length(_)
            | ProtocolNotModbus(_)
            | FnCode { .. }
            | Truncated { .. } => ErrorKind::Framing,
            TransactionMismatch { .. } => ErrorKind::TransactionMismatch,
            Exception(_) => ErrorKind::Exception,
            AckMismatch { .. } => ErrorKind::AckMismatch,
            Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns `true` if the byte stream can no longer be trusted after
    /// this error occurred during an exchange.
    #[must_use]
    pub const fn is_desynchronizing(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Framing | ErrorKind::TransactionMismatch | ErrorKind::Cancelled
        ) || matches!(self, Error::Io(_) | Error::ConnectionClosed)
    }

    /// The Modbus exception carried by this error, if any.
    #[must_use]
    pub const fn exception(&self) -> Option<ExceptionResponse> {
        match self {
            Error::Exception(ex) => Some(*ex),
            _ => None,
        }
    }
}
