use ndarray::Array2;

use super::constants::LAST_LINE_NUMBER;
use super::hardware_id::LineAddress;
use super::line::Line;
use super::package::{empty_grid, Package};

/// LineStream reassembles the 5-line packages of one (board, ASIC, half).
///
/// A package is only in progress while its lines arrive as a contiguous ascending run
/// starting at line 0. Anything else drops the partial package silently; the next line 0
/// starts over. Noisy real-time data is expected, so no error is raised for this.
#[derive(Debug, Clone)]
pub struct LineStream {
    address: LineAddress,
    package: Array2<u32>,
    timestamp: Option<u32>,
    last_line_received: Option<u8>,
    completed_packages: u64,
    broken_packages: u64,
}

impl LineStream {
    pub fn new(address: LineAddress) -> Self {
        Self {
            address,
            package: empty_grid(),
            timestamp: None,
            last_line_received: None,
            completed_packages: 0,
            broken_packages: 0,
        }
    }

    /// Add a line to the package being reassembled.
    ///
    /// Returns the decoded Package when this line completed it.
    pub fn add_line(&mut self, line: &Line) -> Option<Package> {
        if line.line_number == 0 {
            self.timestamp = Some(line.timestamp);
            self.last_line_received = None;
        }

        let expected = self.last_line_received.map_or(0, |last| last + 1);
        if line.line_number != expected {
            if self.last_line_received.is_some() {
                log::debug!(
                    "Broken package on {:?}: expected line {expected}, got {}",
                    self.address,
                    line.line_number
                );
                self.broken_packages += 1;
            }
            self.reset();
            if line.line_number <= LAST_LINE_NUMBER {
                self.store(line);
            }
            return None;
        }

        self.store(line);
        self.last_line_received = Some(line.line_number);

        if line.line_number == LAST_LINE_NUMBER {
            let timestamp = self.timestamp.unwrap_or(line.timestamp);
            let package = Package::from_grid(self.address, timestamp as u64, &self.package);
            self.completed_packages += 1;
            self.reset();
            return Some(package);
        }
        None
    }

    fn store(&mut self, line: &Line) {
        let mut row = self.package.row_mut(line.line_number as usize);
        for (slot, word) in row.iter_mut().zip(line.payload.iter()) {
            *slot = *word;
        }
    }

    fn reset(&mut self) {
        self.timestamp = None;
        self.last_line_received = None;
    }

    pub fn address(&self) -> &LineAddress {
        &self.address
    }

    pub fn completed_packages(&self) -> u64 {
        self.completed_packages
    }

    /// Partial packages lost to out-of-sequence lines
    pub fn broken_packages(&self) -> u64 {
        self.broken_packages
    }

    pub fn is_in_progress(&self) -> bool {
        self.last_line_received.is_some()
    }
}
