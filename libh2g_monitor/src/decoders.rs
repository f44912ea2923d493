//! Stateless bit level decoding of packet fields.
use bitvec::prelude::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::constants::{
    ASIC_CODES, HALF_CODES, MAX_BOARDS, TOT_SHIFT, TOT_SHIFTED_MASK, TOT_SHIFT_FLAG,
};

/// Assemble the 4 bytes starting at offset into a word.
///
/// # Panics
/// Panics if fewer than 4 bytes remain after offset. Callers check the bounds.
pub fn decode_word(buffer: &[u8], offset: usize, big_endian: bool) -> u32 {
    let bytes = &buffer[offset..offset + 4];
    if big_endian {
        BigEndian::read_u32(bytes)
    } else {
        LittleEndian::read_u32(bytes)
    }
}

/// Assemble the 8 bytes starting at offset into a long word.
///
/// # Panics
/// Panics if fewer than 8 bytes remain after offset. Callers check the bounds.
pub fn decode_long_word(buffer: &[u8], offset: usize, big_endian: bool) -> u64 {
    let bytes = &buffer[offset..offset + 8];
    if big_endian {
        BigEndian::read_u64(bytes)
    } else {
        LittleEndian::read_u64(bytes)
    }
}

pub fn decode_asic(raw: u8) -> Option<u8> {
    ASIC_CODES.iter().position(|c| *c == raw).map(|id| id as u8)
}

pub fn encode_asic(asic_id: u8) -> Option<u8> {
    ASIC_CODES.get(asic_id as usize).copied()
}

pub fn decode_half(raw: u8) -> Option<u8> {
    HALF_CODES.iter().position(|c| *c == raw).map(|id| id as u8)
}

pub fn encode_half(half_id: u8) -> Option<u8> {
    HALF_CODES.get(half_id as usize).copied()
}

/// Boards are sent as their id directly
pub fn decode_board(raw: u8) -> Option<u8> {
    if (raw as usize) < MAX_BOARDS {
        Some(raw)
    } else {
        None
    }
}

pub fn encode_board(board_id: u8) -> Option<u8> {
    decode_board(board_id)
}

/// Recover the 12-bit TOT counter from its 10-bit transmitted form.
///
/// If the most significant transmitted bit is set, the lower three bits of the counter
/// were dropped on the ASIC.
pub fn unshift_tot(raw: u16) -> u16 {
    if raw & TOT_SHIFT_FLAG != 0 {
        (raw & TOT_SHIFTED_MASK) << TOT_SHIFT
    } else {
        raw
    }
}

/// Ticks from `earlier` to `later` on a counter `bits` wide, modulo the counter range
pub fn timestamp_delta(later: u64, earlier: u64, bits: u32) -> u64 {
    if bits >= 64 {
        later.wrapping_sub(earlier)
    } else {
        later.wrapping_sub(earlier) & ((1u64 << bits) - 1)
    }
}

/// Signed distance from `earlier` to `later` on a counter `bits` wide.
///
/// The shorter way around the counter wins, so a value just past a wrap counts as ahead.
pub fn timestamp_offset(later: u64, earlier: u64, bits: u32) -> i64 {
    if bits >= 64 {
        later.wrapping_sub(earlier) as i64
    } else {
        let shift = 64 - bits;
        ((timestamp_delta(later, earlier, bits) << shift) as i64) >> shift
    }
}

/// One channel readout word: [Tc][Tp][10b ADC][10b TOT][10b TOA]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelWord {
    pub tc: bool,
    pub tp: bool,
    pub adc: u16,
    pub tot: u16,
    pub toa: u16,
}

impl From<u32> for ChannelWord {
    fn from(raw: u32) -> Self {
        let bits = raw.view_bits::<Lsb0>();
        Self {
            tc: bits[31],
            tp: bits[30],
            adc: bits[20..30].load_le::<u16>(),
            tot: unshift_tot(bits[10..20].load_le::<u16>()),
            toa: bits[0..10].load_le::<u16>(),
        }
    }
}

impl ChannelWord {
    /// Pack the word back into its transmitted form. A TOT too large for 10 bits is
    /// sent shifted, losing its lower three bits.
    pub fn to_raw(&self) -> u32 {
        let tot = if self.tot >= TOT_SHIFT_FLAG {
            TOT_SHIFT_FLAG | ((self.tot >> TOT_SHIFT) & TOT_SHIFTED_MASK)
        } else {
            self.tot
        };
        let mut raw = 0u32;
        let bits = raw.view_bits_mut::<Lsb0>();
        bits.set(31, self.tc);
        bits.set(30, self.tp);
        bits[20..30].store_le(self.adc & 0x3FF);
        bits[10..20].store_le(tot);
        bits[0..10].store_le(self.toa & 0x3FF);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_word_endianness() {
        let buffer = [0x00, 0x01, 0x52, 0x71, 0x24, 0x5A];
        assert_eq!(decode_word(&buffer, 1, true), 0x0152_7124);
        assert_eq!(decode_word(&buffer, 1, false), 0x2471_5201);
        let long = [1, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_long_word(&long, 0, false), 1);
        assert_eq!(decode_long_word(&long, 0, true), 1 << 56);
    }

    #[test]
    fn test_id_tables() {
        assert_eq!(decode_asic(160), Some(0));
        assert_eq!(decode_asic(161), Some(1));
        assert_eq!(decode_asic(162), None);
        assert_eq!(decode_half(36), Some(0));
        assert_eq!(decode_half(37), Some(1));
        assert_eq!(decode_half(0), None);
        assert_eq!(encode_asic(1), Some(161));
        assert_eq!(encode_half(2), None);
        assert_eq!(decode_board(3), Some(3));
        assert_eq!(decode_board(200), None);
    }

    #[test]
    fn test_unshift_tot() {
        for raw in [0x200u16, 0x2FF, 0x3FF, 0x201] {
            assert_eq!(unshift_tot(raw), (raw & 0x1FF) << 3);
        }
        for raw in [0u16, 0x1FF, 0x100] {
            assert_eq!(unshift_tot(raw), raw);
        }
    }

    #[test]
    fn test_timestamp_wrap() {
        assert_eq!(timestamp_delta(0x10, 0xFFFF_FFF0, 32), 0x20);
        assert_eq!(timestamp_delta(99, 100, 32), 0xFFFF_FFFF);
        assert_eq!(timestamp_offset(0x10, 0xFFFF_FFF0, 32), 0x20);
        assert_eq!(timestamp_offset(0xFFFF_FFF0, 0x10, 32), -0x20);
        assert_eq!(timestamp_offset(3000, 3_000_000_000, 32), 1_294_970_296);
        assert_eq!(timestamp_offset(5, 10, 64), -5);
        assert_eq!(timestamp_delta(1 << 40, 0, 64), 1 << 40);
    }

    #[test]
    fn test_channel_word_fields() {
        // Tc=1 Tp=0 ADC=0x155 TOT=0x0AA TOA=0x3FF
        let raw: u32 = (1 << 31) | (0x155 << 20) | (0x0AA << 10) | 0x3FF;
        let word = ChannelWord::from(raw);
        assert!(word.tc);
        assert!(!word.tp);
        assert_eq!(word.adc, 0x155);
        assert_eq!(word.tot, 0x0AA);
        assert_eq!(word.toa, 0x3FF);
        assert_eq!(word.to_raw(), raw);
    }

    #[test]
    fn test_channel_word_shifted_tot() {
        let raw: u32 = (1 << 30) | (0x201 << 10);
        let word = ChannelWord::from(raw);
        assert!(word.tp);
        assert_eq!(word.tot, 8);
        assert_eq!(word.adc, 0);
    }
}
