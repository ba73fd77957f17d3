// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common helpers

use crate::{
    error::{Error, Result},
    frame::{COIL_OFF, COIL_ON, Coil, FunctionCode},
};

/// Turn a bool into a u16 coil value
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state { COIL_ON } else { COIL_OFF }
}

/// Turn a u16 coil value into a boolean value.
///
/// Any value other than `0xFF00` or `0x0000` is rejected as
/// an acknowledgement that does not match the written coil.
pub fn u16_coil_to_bool(coil: u16, address: u16, expected: Coil) -> Result<bool> {
    match coil {
        COIL_ON => Ok(true),
        COIL_OFF => Ok(false),
        _ => Err(Error::AckMismatch {
            function: FunctionCode::WriteSingleCoil,
            expected: (address, bool_to_u16_coil(expected)),
            actual: (address, coil),
        }),
    }
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

///  Pack coils into a byte array.
///
///  It returns the number of bytes used to pack the coils.
///  Padding bits of the last byte are written as `0`.
pub fn pack_coils(coils: &[Coil], bytes: &mut [u8]) -> Result<usize> {
    let packed_size = packed_coils_len(coils.len());
    if bytes.len() < packed_size {
        return Err(Error::Truncated {
            expected: packed_size,
            received: bytes.len(),
        });
    }
    bytes[..packed_size].fill(0);
    coils.iter().enumerate().for_each(|(i, b)| {
        let v = if *b { 0b1 } else { 0b0 };
        bytes[i / 8] |= v << (i % 8);
    });
    Ok(packed_size)
}
