use byteorder::{BigEndian, ByteOrder};

use super::constants::{
    LINE_ASIC_OFFSET, LINE_BOARD_OFFSET, LINE_HALF_OFFSET, LINE_NUMBER_OFFSET,
    LINE_PAYLOAD_OFFSET, LINE_SIZE, LINE_TIMESTAMP_OFFSET, WORDS_PER_LINE,
};
use super::decoders::{
    decode_asic, decode_board, decode_half, decode_word, encode_asic, encode_board, encode_half,
};
use super::hardware_id::LineAddress;

/// Line is the decoded form of one 40-byte line record.
///
/// Identifiers which do not decode to a known value are None, and such a line is
/// dropped before it reaches reassembly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub asic_id: Option<u8>,
    pub board_id: Option<u8>,
    pub half_id: Option<u8>,
    pub line_number: u8,
    pub timestamp: u32,
    pub payload: [u32; WORDS_PER_LINE],
}

impl Line {
    /// Decode a line record from the first 40 bytes of buffer.
    ///
    /// # Panics
    /// Panics if the buffer is shorter than a line record.
    pub fn decode(buffer: &[u8]) -> Self {
        let mut payload = [0u32; WORDS_PER_LINE];
        for (idx, word) in payload.iter_mut().enumerate() {
            *word = decode_word(buffer, LINE_PAYLOAD_OFFSET + idx * 4, true);
        }
        Self {
            asic_id: decode_asic(buffer[LINE_ASIC_OFFSET]),
            board_id: decode_board(buffer[LINE_BOARD_OFFSET]),
            half_id: decode_half(buffer[LINE_HALF_OFFSET]),
            line_number: buffer[LINE_NUMBER_OFFSET],
            timestamp: decode_word(buffer, LINE_TIMESTAMP_OFFSET, true),
            payload,
        }
    }

    /// Encode the line as a 40-byte record. Invalid identifiers are written as 0xFF.
    pub fn to_bytes(&self) -> [u8; LINE_SIZE] {
        let mut bytes = [0u8; LINE_SIZE];
        bytes[LINE_ASIC_OFFSET] = self.asic_id.and_then(encode_asic).unwrap_or(0xFF);
        bytes[LINE_BOARD_OFFSET] = self.board_id.and_then(encode_board).unwrap_or(0xFF);
        bytes[LINE_HALF_OFFSET] = self.half_id.and_then(encode_half).unwrap_or(0xFF);
        bytes[LINE_NUMBER_OFFSET] = self.line_number;
        BigEndian::write_u32(&mut bytes[LINE_TIMESTAMP_OFFSET..], self.timestamp);
        BigEndian::write_u32_into(&self.payload, &mut bytes[LINE_PAYLOAD_OFFSET..]);
        bytes
    }

    /// The reassembly stream this line belongs to, if all identifiers are valid
    pub fn address(&self) -> Option<LineAddress> {
        Some(LineAddress::new(self.board_id?, self.asic_id?, self.half_id?))
    }

    pub fn is_valid(&self) -> bool {
        self.address().is_some()
    }
}
