use ndarray::Array2;

use super::constants::{
    CALIBRATION_POSITION, CHANNELS_PER_HALF, COMMON_MODE_POSITION, CRC_POSITION, HEADER_POSITION,
    LINES_PER_PACKAGE, WORDS_PER_LINE,
};
use super::decoders::ChannelWord;
use super::hardware_id::LineAddress;

/// Allocate an empty (line, word) grid for one package
pub fn empty_grid() -> Array2<u32> {
    Array2::zeros((LINES_PER_PACKAGE, WORDS_PER_LINE))
}

fn is_metadata(position: (usize, usize)) -> bool {
    position == HEADER_POSITION
        || position == COMMON_MODE_POSITION
        || position == CALIBRATION_POSITION
        || position == CRC_POSITION
}

/// Package is a complete 5-line unit decoded into its metadata and 36 channel words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub address: LineAddress,
    pub timestamp: u64,
    pub header: u32,
    pub common_mode: u32,
    pub calibration: u32,
    pub crc: u32,
    pub channels: Vec<ChannelWord>,
}

impl Package {
    /// Decode the channel words out of a filled (line, word) grid.
    ///
    /// Words are taken in line-major order, skipping the four metadata positions.
    pub fn from_grid(address: LineAddress, timestamp: u64, grid: &Array2<u32>) -> Self {
        let channels: Vec<ChannelWord> = grid
            .indexed_iter()
            .filter(|(position, _)| !is_metadata(*position))
            .map(|(_, word)| ChannelWord::from(*word))
            .collect();
        debug_assert_eq!(channels.len(), CHANNELS_PER_HALF);

        Self {
            address,
            timestamp,
            header: grid[HEADER_POSITION],
            common_mode: grid[COMMON_MODE_POSITION],
            calibration: grid[CALIBRATION_POSITION],
            crc: grid[CRC_POSITION],
            channels,
        }
    }

    /// Channel number within the ASIC of the idx-th word in this package
    pub fn asic_channel(&self, idx: usize) -> usize {
        idx + CHANNELS_PER_HALF * self.address.half_id as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_grid_skips_metadata() {
        let mut grid = empty_grid();
        let mut next_adc = 0u32;
        for ((line, word), value) in grid.indexed_iter_mut() {
            if is_metadata((line, word)) {
                *value = 0xFFFF_FFFF;
            } else {
                *value = next_adc << 20;
                next_adc += 1;
            }
        }
        let package = Package::from_grid(LineAddress::new(1, 0, 1), 77, &grid);
        assert_eq!(package.channels.len(), 36);
        assert_eq!(package.header, 0xFFFF_FFFF);
        assert_eq!(package.crc, 0xFFFF_FFFF);
        for (idx, word) in package.channels.iter().enumerate() {
            assert_eq!(word.adc as usize, idx);
        }
        assert_eq!(package.asic_channel(0), 36);
        assert_eq!(package.asic_channel(35), 71);
    }
}
