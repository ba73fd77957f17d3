// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::util::*;

/// Packed coils as received in a read response.
///
/// Only the first `quantity` bits are meaningful, padding bits of the
/// last byte are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coils<'c> {
    pub(crate) data: RawData<'c>,
    pub(crate) quantity: usize,
}

impl<'c> Coils<'c> {
    /// Wrap packed coil bytes, checking that they cover `quantity` bits.
    pub fn new(data: &'c [u8], quantity: usize) -> Result<Self> {
        let expected = packed_coils_len(quantity);
        if data.len() < expected {
            return Err(Error::Truncated {
                expected,
                received: data.len(),
            });
        }
        Ok(Coils {
            data: &data[..expected],
            quantity,
        })
    }
    /// Quantity of coils
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }
    ///  Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }
    /// Get a specific coil.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Coil> {
        if idx >= self.quantity {
            return None;
        }
        Some((self.data[idx / 8] >> (idx % 8)) & 0b1 > 0)
    }
}

/// Coils iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilsIter<'c> {
    cnt: usize,
    coils: Coils<'c>,
}

impl Iterator for CoilsIter<'_> {
    type Item = Coil;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.coils.get(self.cnt);
        self.cnt += 1;
        result
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.coils.quantity.saturating_sub(self.cnt);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CoilsIter<'_> {}

impl<'c> IntoIterator for Coils<'c> {
    type Item = Coil;
    type IntoIter = CoilsIter<'c>;

    fn into_iter(self) -> Self::IntoIter {
        CoilsIter {
            cnt: 0,
            coils: self,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn new_checks_packed_length() {
        assert!(Coils::new(&[0xFF], 8).is_ok());
        assert!(matches!(
            Coils::new(&[0xFF], 9),
            Err(Error::Truncated {
                expected: 2,
                received: 1
            })
        ));
        let coils = Coils::new(&[0xFF, 0x01, 0xAA], 9).unwrap();
        assert_eq!(coils.data, &[0xFF, 0x01]);
    }

    #[test]
    fn coils_len() {
        let coils = Coils {
            data: &[0, 1, 2],
            quantity: 5,
        };
        assert_eq!(coils.len(), 5);
    }

    #[test]
    fn coils_empty() {
        let coils = Coils {
            data: &[0, 1, 2],
            quantity: 0,
        };
        assert!(coils.is_empty());
    }

    #[test]
    fn coils_get() {
        let coils = Coils {
            data: &[0b1],
            quantity: 1,
        };
        assert_eq!(coils.get(0), Some(true));
        assert_eq!(coils.get(1), None);

        let coils = Coils {
            data: &[0xff, 0b11],
            quantity: 10,
        };
        for i in 0..10 {
            assert_eq!(coils.get(i), Some(true));
        }
        assert_eq!(coils.get(10), None);
    }

    #[test]
    fn padding_bits_are_ignored() {
        let coils = Coils {
            data: &[0b1111_1101],
            quantity: 3,
        };
        let bools: Vec<_> = coils.into_iter().collect();
        assert_eq!(bools, [true, false, true]);
    }

    #[test]
    fn coils_iter() {
        let coils = Coils {
            data: &[0b0101_0011],
            quantity: 5,
        };
        let mut coils_iter = coils.into_iter();
        assert_eq!(coils_iter.len(), 5);
        assert_eq!(coils_iter.next(), Some(true));
        assert_eq!(coils_iter.next(), Some(true));
        assert_eq!(coils_iter.next(), Some(false));
        assert_eq!(coils_iter.next(), Some(false));
        assert_eq!(coils_iter.next(), Some(true));
        assert_eq!(coils_iter.next(), None);
        assert_eq!(coils_iter.len(), 0);
    }
}
