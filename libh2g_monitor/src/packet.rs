//! Packet level framing for both protocol generations.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::Array2;
use time::{Duration, OffsetDateTime};

use super::config::Protocol;
use super::constants::*;
use super::decoders::{decode_asic, decode_half, decode_long_word, decode_word, encode_asic, encode_half};
use super::error::PacketError;
use super::hardware_id::LineAddress;
use super::line::Line;
use super::package::{empty_grid, Package};

/// A wall clock marker sent by the boards in place of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub seconds: u32,
    pub milliseconds: u32,
}

impl Heartbeat {
    /// Decode a heartbeat packet
    pub fn decode(buffer: &[u8]) -> Result<Self, PacketError> {
        if !is_heartbeat(buffer) {
            return Err(PacketError::NotHeartbeat);
        }
        if buffer.len() < HEARTBEAT_MIN_SIZE {
            return Err(PacketError::TooShort(buffer.len(), HEARTBEAT_MIN_SIZE));
        }
        Ok(Self {
            seconds: decode_word(buffer, HEARTBEAT_SECONDS_OFFSET, false),
            milliseconds: decode_word(buffer, HEARTBEAT_MILLISECONDS_OFFSET, false),
        })
    }

    /// Encode as a heartbeat packet of the given size
    pub fn to_bytes(&self, packet_size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; packet_size.max(HEARTBEAT_MIN_SIZE)];
        bytes[..HEARTBEAT_MAGIC.len()].copy_from_slice(&HEARTBEAT_MAGIC);
        LittleEndian::write_u32(&mut bytes[HEARTBEAT_SECONDS_OFFSET..], self.seconds);
        LittleEndian::write_u32(&mut bytes[HEARTBEAT_MILLISECONDS_OFFSET..], self.milliseconds);
        bytes
    }

    /// Interpret the marker as a UTC unix time
    pub fn datetime(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.seconds as i64)
            .ok()
            .map(|t| t + Duration::milliseconds(self.milliseconds as i64))
    }
}

/// Heartbeats are recognized by their magic prefix
pub fn is_heartbeat(buffer: &[u8]) -> bool {
    buffer.starts_with(&HEARTBEAT_MAGIC)
}

/// The fields of a data packet used for loss accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub board_id: u8,
    pub sequence: u32,
}

impl PacketHeader {
    /// Decode the packet header of either protocol.
    ///
    /// The legacy format carries a 16-bit sequence number and the board in a fixed header
    /// byte; v013 carries a 32-bit packet number and the board as the low nibble of the
    /// configured header byte.
    pub fn decode(
        buffer: &[u8],
        protocol: Protocol,
        board_id_offset: usize,
    ) -> Result<Self, PacketError> {
        match protocol {
            Protocol::Legacy => {
                if buffer.len() < LEGACY_HEADER_SIZE {
                    return Err(PacketError::TooShort(buffer.len(), LEGACY_HEADER_SIZE));
                }
                Ok(Self {
                    board_id: buffer[LEGACY_BOARD_OFFSET],
                    sequence: BigEndian::read_u16(&buffer[LEGACY_SEQUENCE_OFFSET..]) as u32,
                })
            }
            Protocol::V013 => {
                let min_size = V013_PACKET_HEADER_SIZE.max(board_id_offset + 1);
                if buffer.len() < min_size {
                    return Err(PacketError::TooShort(buffer.len(), min_size));
                }
                Ok(Self {
                    board_id: buffer[board_id_offset] & 0x0F,
                    sequence: decode_word(buffer, V013_SEQUENCE_OFFSET, true),
                })
            }
        }
    }
}

/// Decode all 36 line records of a legacy packet
pub fn decode_legacy_lines(buffer: &[u8]) -> Result<Vec<Line>, PacketError> {
    if buffer.len() < LEGACY_PACKET_SIZE {
        return Err(PacketError::TooShort(buffer.len(), LEGACY_PACKET_SIZE));
    }
    Ok(buffer[LEGACY_HEADER_SIZE..LEGACY_PACKET_SIZE]
        .chunks_exact(LINE_SIZE)
        .map(Line::decode)
        .collect())
}

/// Encode a legacy packet. Unused line slots are zero filled, which never decodes to a
/// valid line.
pub fn encode_legacy_packet(board_id: u8, sequence: u16, lines: &[Line]) -> Vec<u8> {
    let mut bytes = vec![0u8; LEGACY_PACKET_SIZE];
    bytes[LEGACY_BOARD_OFFSET] = board_id;
    BigEndian::write_u16(&mut bytes[LEGACY_SEQUENCE_OFFSET..], sequence);
    for (line, slot) in lines
        .iter()
        .take(LINES_PER_PACKET)
        .zip(bytes[LEGACY_HEADER_SIZE..].chunks_exact_mut(LINE_SIZE))
    {
        slot.copy_from_slice(&line.to_bytes());
    }
    bytes
}

/// One sync-marker framed package of the v013 protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V013Frame {
    pub asic_id: Option<u8>,
    pub half_id: Option<u8>,
    pub trigger_in: u32,
    pub trigger_out: u32,
    pub event_counter: u32,
    pub timestamp: u64,
    pub words: Array2<u32>,
}

impl V013Frame {
    /// Decode a frame whose sync marker starts at the beginning of buffer.
    /// Returns None when the buffer cannot hold a full frame.
    fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < V013_FRAME_SIZE || !buffer.starts_with(&V013_SYNC_MARKER) {
            return None;
        }
        let mut words = empty_grid();
        for (idx, word) in words.iter_mut().enumerate() {
            *word = decode_word(buffer, V013_FRAME_HEADER_SIZE + idx * 4, true);
        }
        Some(Self {
            asic_id: decode_asic(buffer[V013_FRAME_ASIC_OFFSET]),
            half_id: decode_half(buffer[V013_FRAME_HALF_OFFSET]),
            trigger_in: decode_word(buffer, V013_TRIGGER_IN_OFFSET, false),
            trigger_out: decode_word(buffer, V013_TRIGGER_OUT_OFFSET, false),
            event_counter: decode_word(buffer, V013_EVENT_COUNTER_OFFSET, false),
            timestamp: decode_long_word(buffer, V013_TIMESTAMP_OFFSET, false),
            words,
        })
    }

    /// Encode the frame including its sync marker
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; V013_FRAME_SIZE];
        bytes[..V013_SYNC_MARKER.len()].copy_from_slice(&V013_SYNC_MARKER);
        bytes[V013_FRAME_ASIC_OFFSET] = self.asic_id.and_then(encode_asic).unwrap_or(0xFF);
        bytes[V013_FRAME_HALF_OFFSET] = self.half_id.and_then(encode_half).unwrap_or(0xFF);
        LittleEndian::write_u32(&mut bytes[V013_TRIGGER_IN_OFFSET..], self.trigger_in);
        LittleEndian::write_u32(&mut bytes[V013_TRIGGER_OUT_OFFSET..], self.trigger_out);
        LittleEndian::write_u32(&mut bytes[V013_EVENT_COUNTER_OFFSET..], self.event_counter);
        LittleEndian::write_u64(&mut bytes[V013_TIMESTAMP_OFFSET..], self.timestamp);
        for (idx, word) in self.words.iter().enumerate() {
            BigEndian::write_u32(&mut bytes[V013_FRAME_HEADER_SIZE + idx * 4..], *word);
        }
        bytes
    }

    /// Turn the frame into a decoded package, if its identifiers are valid
    pub fn into_package(self, board_id: u8) -> Option<Package> {
        let address = LineAddress::new(board_id, self.asic_id?, self.half_id?);
        Some(Package::from_grid(address, self.timestamp, &self.words))
    }
}

/// Scan a v013 packet for framed packages.
///
/// The scan starts after the packet header and stops at the first marker that is not
/// followed by a complete frame.
pub fn scan_v013_frames(buffer: &[u8]) -> Vec<V013Frame> {
    let mut frames = Vec::new();
    let mut cursor = V013_PACKET_HEADER_SIZE;
    while cursor + V013_SYNC_MARKER.len() <= buffer.len() {
        if !buffer[cursor..].starts_with(&V013_SYNC_MARKER) {
            cursor += 1;
            continue;
        }
        match V013Frame::decode(&buffer[cursor..]) {
            Some(frame) => {
                frames.push(frame);
                cursor += V013_FRAME_SIZE;
            }
            None => {
                log::trace!(
                    "Truncated v013 frame at byte {cursor}; {} bytes remain",
                    buffer.len() - cursor
                );
                break;
            }
        }
    }
    frames
}

/// Encode a v013 packet holding the given frames
pub fn encode_v013_packet(
    board_id: u8,
    sequence: u32,
    board_id_offset: usize,
    frames: &[V013Frame],
) -> Vec<u8> {
    let mut bytes = vec![0u8; V013_PACKET_HEADER_SIZE];
    BigEndian::write_u32(&mut bytes[V013_SEQUENCE_OFFSET..], sequence);
    bytes[board_id_offset] = board_id & 0x0F;
    for frame in frames {
        bytes.extend_from_slice(&frame.to_bytes());
    }
    bytes
}
