// Packet framing (legacy protocol)
/// Bytes preceding the first line record of a legacy packet
pub const LEGACY_HEADER_SIZE: usize = 12;
/// Offset of the big-endian 16-bit packet sequence number
pub const LEGACY_SEQUENCE_OFFSET: usize = 2;
/// Header byte carrying the board id of a legacy packet
pub const LEGACY_BOARD_OFFSET: usize = 1;
/// Size of one line record in bytes
pub const LINE_SIZE: usize = 40;
/// Number of line records in one legacy packet
pub const LINES_PER_PACKET: usize = 36;
/// Total size of a legacy packet
pub const LEGACY_PACKET_SIZE: usize = LEGACY_HEADER_SIZE + LINE_SIZE * LINES_PER_PACKET;

// Line record layout
pub const LINE_ASIC_OFFSET: usize = 0;
pub const LINE_BOARD_OFFSET: usize = 1;
pub const LINE_HALF_OFFSET: usize = 2;
pub const LINE_NUMBER_OFFSET: usize = 3;
pub const LINE_TIMESTAMP_OFFSET: usize = 4;
pub const LINE_PAYLOAD_OFFSET: usize = 8;

// Package layout
pub const WORDS_PER_LINE: usize = 8;
pub const LINES_PER_PACKAGE: usize = 5;
pub const LAST_LINE_NUMBER: u8 = (LINES_PER_PACKAGE - 1) as u8;
pub const CHANNELS_PER_HALF: usize = 36;
pub const HALVES_PER_ASIC: usize = 2;
/// (line, word) positions of the metadata words inside a package grid
pub const HEADER_POSITION: (usize, usize) = (0, 0);
pub const COMMON_MODE_POSITION: (usize, usize) = (0, 1);
pub const CALIBRATION_POSITION: (usize, usize) = (3, 5);
pub const CRC_POSITION: (usize, usize) = (4, 7);

// Identifier encodings
pub const ASIC_CODES: [u8; 2] = [160, 161];
pub const HALF_CODES: [u8; 2] = [36, 37];
/// Board ids are carried as a 4-bit value
pub const MAX_BOARDS: usize = 16;

// Channel word fields
pub const TOT_SHIFT_FLAG: u16 = 0x200;
pub const TOT_SHIFTED_MASK: u16 = 0x1FF;
pub const TOT_SHIFT: u32 = 3;

// Heartbeat packets
pub const HEARTBEAT_MAGIC: [u8; 4] = *b"HRTB";
pub const HEARTBEAT_SECONDS_OFFSET: usize = 12;
pub const HEARTBEAT_MILLISECONDS_OFFSET: usize = 16;
pub const HEARTBEAT_MIN_SIZE: usize = 20;

// v013 protocol
/// Offset of the big-endian 32-bit packet number
pub const V013_SEQUENCE_OFFSET: usize = 0;
/// Frames are searched for after this many bytes
pub const V013_PACKET_HEADER_SIZE: usize = 12;
pub const V013_SYNC_MARKER: [u8; 2] = [0xAA, 0x5A];
pub const V013_FRAME_ASIC_OFFSET: usize = 2;
pub const V013_FRAME_HALF_OFFSET: usize = 3;
pub const V013_TRIGGER_IN_OFFSET: usize = 4;
pub const V013_TRIGGER_OUT_OFFSET: usize = 8;
pub const V013_EVENT_COUNTER_OFFSET: usize = 12;
pub const V013_TIMESTAMP_OFFSET: usize = 16;
pub const V013_FRAME_HEADER_SIZE: usize = 24;
pub const V013_FRAME_SIZE: usize =
    V013_FRAME_HEADER_SIZE + LINES_PER_PACKAGE * WORDS_PER_LINE * 4;
