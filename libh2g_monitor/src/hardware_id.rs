use super::config::Config;
use super::constants::HALVES_PER_ASIC;

/// HardwareID is the full address of a single readout channel.
///
/// The channel is counted within its ASIC, so that both halves of an ASIC share one
/// channel axis (half 1 starts at channel 36).
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
pub struct HardwareID {
    pub board_id: u8,
    pub asic_id: u8,
    pub channel: u8,
}

impl HardwareID {
    /// Construct a new hardware ID
    pub fn new(board_id: u8, asic_id: u8, channel: u8) -> Self {
        HardwareID {
            board_id,
            asic_id,
            channel,
        }
    }
}

impl std::fmt::Display for HardwareID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "board {} asic {} channel {}",
            self.board_id, self.asic_id, self.channel
        )
    }
}

/// LineAddress identifies one line reassembly stream (one half of one ASIC).
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
pub struct LineAddress {
    pub board_id: u8,
    pub asic_id: u8,
    pub half_id: u8,
}

impl LineAddress {
    pub fn new(board_id: u8, asic_id: u8, half_id: u8) -> Self {
        LineAddress {
            board_id,
            asic_id,
            half_id,
        }
    }
}

/// ChannelLayout maps composite hardware addresses onto flat, bounds-checked indices.
///
/// All of the per-channel and per-line state of the monitor lives in plain vectors
/// indexed through this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub num_boards: usize,
    pub num_asics: usize,
    pub channels_per_asic: usize,
}

impl ChannelLayout {
    pub fn new(num_boards: usize, num_asics: usize, channels_per_asic: usize) -> Self {
        Self {
            num_boards,
            num_asics,
            channels_per_asic,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.num_boards,
            config.num_asics,
            config.channels_per_asic,
        )
    }

    /// Channel slots on a single board
    pub fn channels_per_board(&self) -> usize {
        self.num_asics * self.channels_per_asic
    }

    /// Channel slots across all boards
    pub fn total_channels(&self) -> usize {
        self.num_boards * self.channels_per_board()
    }

    /// Line streams across all boards
    pub fn total_line_streams(&self) -> usize {
        self.num_boards * self.num_asics * HALVES_PER_ASIC
    }

    /// Slot of a channel within its board. None if the address is outside the layout.
    pub fn board_slot(&self, id: &HardwareID) -> Option<usize> {
        let asic = id.asic_id as usize;
        let channel = id.channel as usize;
        if asic >= self.num_asics || channel >= self.channels_per_asic {
            return None;
        }
        Some(asic * self.channels_per_asic + channel)
    }

    /// Global flat index of a channel. None if the address is outside the layout.
    pub fn channel_index(&self, id: &HardwareID) -> Option<usize> {
        let board = id.board_id as usize;
        if board >= self.num_boards {
            return None;
        }
        self.board_slot(id)
            .map(|slot| board * self.channels_per_board() + slot)
    }

    /// Inverse of channel_index
    pub fn hardware_id(&self, index: usize) -> Option<HardwareID> {
        if index >= self.total_channels() {
            return None;
        }
        let board = index / self.channels_per_board();
        let slot = index % self.channels_per_board();
        Some(HardwareID::new(
            board as u8,
            (slot / self.channels_per_asic) as u8,
            (slot % self.channels_per_asic) as u8,
        ))
    }

    /// Global flat index of a line stream. None if the address is outside the layout.
    pub fn line_index(&self, address: &LineAddress) -> Option<usize> {
        let board = address.board_id as usize;
        let asic = address.asic_id as usize;
        let half = address.half_id as usize;
        if board >= self.num_boards || asic >= self.num_asics || half >= HALVES_PER_ASIC {
            return None;
        }
        Some((board * self.num_asics + asic) * HALVES_PER_ASIC + half)
    }

    /// Inverse of line_index
    pub fn line_address(&self, index: usize) -> Option<LineAddress> {
        if index >= self.total_line_streams() {
            return None;
        }
        let half = index % HALVES_PER_ASIC;
        let asic = (index / HALVES_PER_ASIC) % self.num_asics;
        let board = index / (HALVES_PER_ASIC * self.num_asics);
        Some(LineAddress::new(board as u8, asic as u8, half as u8))
    }
}
