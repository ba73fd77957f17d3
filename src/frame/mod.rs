// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod coils;
mod data;
pub(crate) mod tcp;

pub use self::{coils::*, data::*, tcp::*};
use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Maximum number of coils or discrete inputs per request.
pub const MAX_COILS: u16 = 2000;

/// Maximum number of registers per request.
pub const MAX_REGISTERS: u16 = 125;

/// Wire value of a coil that is `ON`.
pub const COIL_ON: u16 = 0xFF00;

/// Wire value of a coil that is `OFF`.
pub const COIL_OFF: u16 = 0x0000;

/// A Modbus function code.
///
/// It is represented by an unsigned 8 bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Modbus Function Code: `01` (`0x01`).
    ReadCoils,

    /// Modbus Function Code: `02` (`0x02`).
    ReadDiscreteInputs,

    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `04` (`0x04`).
    ReadInputRegisters,

    /// Modbus Function Code: `05` (`0x05`).
    WriteSingleCoil,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `15` (`0x0F`).
    WriteMultipleCoils,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Any other function code, only ever seen in responses.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::Custom(code) => code,
        }
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Raw PDU data
type RawData<'r> = &'r [u8];

/// A request represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'r> {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, &'r [Coil]),
    WriteMultipleRegisters(Address, &'r [Word]),
}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "function = 0x{:0>2X}, exception = 0x{:0>2X} ({})",
            self.function.value(),
            self.exception.code(),
            self.exception
        )
    }
}

/// Represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPdu<'r>(pub Request<'r>);

/// Represents a message from the server (slave) to the client (master).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePdu<'r>(pub core::result::Result<Response<'r>, ExceptionResponse>);

/// The response data of a successful request.
///
/// Write acknowledgements are only constructed after their echo has been
/// verified against the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'r> {
    ReadCoils(Coils<'r>),
    ReadDiscreteInputs(Coils<'r>),
    ReadHoldingRegisters(Data<'r>),
    ReadInputRegisters(Data<'r>),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Quantity),
    WriteMultipleRegisters(Address, Quantity),
}

impl<'r> From<Request<'r>> for FunctionCode {
    fn from(r: Request<'r>) -> Self {
        use Request as R;

        match r {
            R::ReadCoils(_, _) => Self::ReadCoils,
            R::ReadDiscreteInputs(_, _) => Self::ReadDiscreteInputs,
            R::ReadHoldingRegisters(_, _) => Self::ReadHoldingRegisters,
            R::ReadInputRegisters(_, _) => Self::ReadInputRegisters,
            R::WriteSingleCoil(_, _) => Self::WriteSingleCoil,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleCoils(_, _) => Self::WriteMultipleCoils,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
        }
    }
}

impl<'r> From<Response<'r>> for FunctionCode {
    fn from(r: Response<'r>) -> Self {
        use Response as R;

        match r {
            R::ReadCoils(_) => Self::ReadCoils,
            R::ReadDiscreteInputs(_) => Self::ReadDiscreteInputs,
            R::ReadHoldingRegisters(_) => Self::ReadHoldingRegisters,
            R::ReadInputRegisters(_) => Self::ReadInputRegisters,
            R::WriteSingleCoil(_, _) => Self::WriteSingleCoil,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleCoils(_, _) => Self::WriteMultipleCoils,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
        }
    }
}

/// A server (slave) exception.
///
/// Variants follow the current Modbus naming. Older documents call the
/// server a slave, so `ServerDeviceFailure` (0x04) is *Slave Device
/// Failure* and `ServerDeviceBusy` (0x06) is *Slave Device Busy*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    /// Slave device failure (0x04).
    ServerDeviceFailure,
    Acknowledge,
    /// Slave device busy (0x06).
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    /// Gateway target device failed to respond (0x0B).
    GatewayTargetDevice,
    /// An exception code not defined by the Modbus specification.
    Other(u8),
}

impl Exception {
    /// Create a new [`Exception`] from its wire `code`.
    #[must_use]
    pub const fn new(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetDevice,
            code => Self::Other(code),
        }
    }

    /// The wire code of this exception.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::ServerDeviceBusy => 0x06,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetDevice => 0x0B,
            Self::Other(code) => code,
        }
    }

    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
            Self::Other(_) => "Unknown exception",
        }
    }
}

impl From<u8> for Exception {
    fn from(code: u8) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

fn check_quantity(quantity: usize, max: u16) -> Result<()> {
    if quantity == 0 || quantity > usize::from(max) {
        return Err(Error::Quantity { quantity, max });
    }
    Ok(())
}

fn check_range(address: Address, quantity: usize) -> Result<()> {
    if usize::from(address) + quantity > usize::from(u16::MAX) + 1 {
        return Err(Error::AddressOverflow { address, quantity });
    }
    Ok(())
}

impl Request<'_> {
    /// Check the request against the limits of the Modbus protocol.
    ///
    /// This never touches the network and must pass before a frame is built.
    pub fn validate(&self) -> Result<()> {
        let (address, quantity, max) = match *self {
            Self::ReadCoils(address, quantity) | Self::ReadDiscreteInputs(address, quantity) => {
                (address, usize::from(quantity), MAX_COILS)
            }
            Self::ReadHoldingRegisters(address, quantity)
            | Self::ReadInputRegisters(address, quantity) => {
                (address, usize::from(quantity), MAX_REGISTERS)
            }
            Self::WriteMultipleCoils(address, coils) => (address, coils.len(), MAX_COILS),
            Self::WriteMultipleRegisters(address, words) => {
                (address, words.len(), MAX_REGISTERS)
            }
            Self::WriteSingleCoil(_, _) | Self::WriteSingleRegister(_, _) => return Ok(()),
        };
        check_quantity(quantity, max)?;
        check_range(address, quantity)
    }

    /// Number of items the response is expected to carry or acknowledge.
    #[must_use]
    pub const fn quantity(&self) -> usize {
        match *self {
            Self::ReadCoils(_, quantity)
            | Self::ReadDiscreteInputs(_, quantity)
            | Self::ReadHoldingRegisters(_, quantity)
            | Self::ReadInputRegisters(_, quantity) => quantity as usize,
            Self::WriteSingleCoil(_, _) | Self::WriteSingleRegister(_, _) => 1,
            Self::WriteMultipleCoils(_, coils) => coils.len(),
            Self::WriteMultipleRegisters(_, words) => words.len(),
        }
    }

    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadCoils(_, _)
            | Self::ReadDiscreteInputs(_, _)
            | Self::ReadInputRegisters(_, _)
            | Self::ReadHoldingRegisters(_, _)
            | Self::WriteSingleRegister(_, _)
            | Self::WriteSingleCoil(_, _) => 5,
            Self::WriteMultipleCoils(_, coils) => 6 + crate::util::packed_coils_len(coils.len()),
            Self::WriteMultipleRegisters(_, words) => 6 + words.len() * 2,
        }
    }
}
