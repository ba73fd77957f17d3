// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};

pub mod tcp;

impl Request<'_> {
    /// Serialize the PDU into `buf`.
    ///
    /// `buf` must hold at least [`Request::pdu_len`] bytes.
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::Truncated {
                expected: len,
                received: buf.len(),
            });
        }
        buf[0] = FunctionCode::from(*self).value();
        match *self {
            Self::ReadCoils(address, quantity)
            | Self::ReadDiscreteInputs(address, quantity)
            | Self::ReadHoldingRegisters(address, quantity)
            | Self::ReadInputRegisters(address, quantity) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], quantity);
            }
            Self::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], bool_to_u16_coil(state));
            }
            Self::WriteSingleRegister(address, word) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], word);
            }
            Self::WriteMultipleCoils(address, coils) => {
                let byte_count = packed_coils_len(coils.len());
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], quantity_u16(coils.len())?);
                buf[5] = byte_count_u8(byte_count)?;
                pack_coils(coils, &mut buf[6..6 + byte_count])?;
            }
            Self::WriteMultipleRegisters(address, words) => {
                let byte_count = words.len() * 2;
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], quantity_u16(words.len())?);
                buf[5] = byte_count_u8(byte_count)?;
                for (i, w) in words.iter().enumerate() {
                    BigEndian::write_u16(&mut buf[6 + i * 2..8 + i * 2], *w);
                }
            }
        }
        Ok(len)
    }
}

fn quantity_u16(quantity: usize) -> Result<u16> {
    u16::try_from(quantity).map_err(|_| Error::Quantity {
        quantity,
        max: u16::MAX,
    })
}

fn byte_count_u8(byte_count: usize) -> Result<u8> {
    u8::try_from(byte_count).map_err(|_| Error::Quantity {
        quantity: byte_count,
        max: u16::from(u8::MAX),
    })
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::Truncated {
                expected: 2,
                received: bytes.len(),
            });
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::FnCode {
                expected: fn_err_code | 0x80,
                actual: fn_err_code,
            });
        }
        Ok(ExceptionResponse {
            function: FunctionCode::new(fn_err_code - 0x80),
            exception: Exception::new(bytes[1]),
        })
    }
}

impl<'r> ResponsePdu<'r> {
    /// Decode the response `pdu` that answers `request`.
    ///
    /// A set high bit of the echoed function code yields an exception
    /// response. Otherwise the function code must match the request, the
    /// payload must cover the requested quantity, and write acknowledgements
    /// must echo exactly what has been written.
    pub fn decode(request: &Request<'_>, pdu: &'r [u8]) -> Result<Self> {
        let Some(&fn_code) = pdu.first() else {
            return Err(Error::Truncated {
                expected: 1,
                received: 0,
            });
        };
        let expected = FunctionCode::from(*request);

        if fn_code & 0x80 != 0 {
            let ex = ExceptionResponse::try_from(pdu)?;
            if ex.function != expected {
                log::warn!(
                    "Exception response echoes function 0x{:0>2X} instead of 0x{:0>2X}",
                    ex.function.value(),
                    expected.value()
                );
            }
            return Ok(ResponsePdu(Err(ex)));
        }

        if fn_code != expected.value() {
            return Err(Error::FnCode {
                expected: expected.value(),
                actual: fn_code,
            });
        }
        if pdu.len() < min_response_pdu_len(expected) {
            return Err(Error::Truncated {
                expected: min_response_pdu_len(expected),
                received: pdu.len(),
            });
        }

        use Request as R;
        let rsp = match *request {
            R::ReadCoils(_, quantity) | R::ReadDiscreteInputs(_, quantity) => {
                let quantity = usize::from(quantity);
                check_byte_count(pdu[1], packed_coils_len(quantity));
                let coils = Coils::new(&pdu[2..], quantity)?;
                if expected == FunctionCode::ReadCoils {
                    Response::ReadCoils(coils)
                } else {
                    Response::ReadDiscreteInputs(coils)
                }
            }
            R::ReadHoldingRegisters(_, quantity) | R::ReadInputRegisters(_, quantity) => {
                let quantity = usize::from(quantity);
                check_byte_count(pdu[1], quantity * 2);
                let data = Data::new(&pdu[2..], quantity)?;
                if expected == FunctionCode::ReadHoldingRegisters {
                    Response::ReadHoldingRegisters(data)
                } else {
                    Response::ReadInputRegisters(data)
                }
            }
            R::WriteSingleCoil(address, state) => {
                let (addr, value) = read_echo(pdu);
                verify_echo(expected, (address, bool_to_u16_coil(state)), (addr, value))?;
                Response::WriteSingleCoil(addr, u16_coil_to_bool(value, address, state)?)
            }
            R::WriteSingleRegister(address, word) => {
                let (addr, value) = read_echo(pdu);
                verify_echo(expected, (address, word), (addr, value))?;
                Response::WriteSingleRegister(addr, value)
            }
            R::WriteMultipleCoils(address, _) | R::WriteMultipleRegisters(address, _) => {
                let (addr, quantity) = read_echo(pdu);
                verify_echo(
                    expected,
                    (address, quantity_u16(request.quantity())?),
                    (addr, quantity),
                )?;
                if expected == FunctionCode::WriteMultipleCoils {
                    Response::WriteMultipleCoils(addr, quantity)
                } else {
                    Response::WriteMultipleRegisters(addr, quantity)
                }
            }
        };
        Ok(ResponsePdu(Ok(rsp)))
    }
}

fn read_echo(pdu: &[u8]) -> (u16, u16) {
    (
        BigEndian::read_u16(&pdu[1..3]),
        BigEndian::read_u16(&pdu[3..5]),
    )
}

fn verify_echo(function: FunctionCode, expected: (u16, u16), actual: (u16, u16)) -> Result<()> {
    if expected != actual {
        return Err(Error::AckMismatch {
            function,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_byte_count(byte_count: u8, expected: usize) {
    if usize::from(byte_count) != expected {
        log::warn!("Byte count {byte_count} does not match the requested quantity ({expected} byte(s))");
    }
}

const fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | ReadHoldingRegisters => 2,
        WriteSingleCoil | WriteMultipleCoils | WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}
