use serde::Serialize;

use super::decoders::timestamp_delta;
use super::error::SampleError;
use super::hardware_id::HardwareID;

/// ChannelEvent accumulates the "machine-gun" waveform samples of one channel.
///
/// Samples arrive in timestamp order with at most `max_gap` between consecutive samples.
/// Once `expected_samples` are held the event is complete. Gaps are measured on a counter
/// `timestamp_bits` wide (64 unless set), so a waveform may span a counter wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub hardware: HardwareID,
    pub event_id: u64,
    expected_samples: usize,
    max_gap: u64,
    timestamp_bits: u32,
    timestamps: Vec<u64>,
    samples: Vec<u16>,
}

impl ChannelEvent {
    pub fn new(hardware: HardwareID, event_id: u64, expected_samples: usize, max_gap: u64) -> Self {
        Self {
            hardware,
            event_id,
            expected_samples,
            max_gap,
            timestamp_bits: 64,
            timestamps: Vec::with_capacity(expected_samples),
            samples: Vec::with_capacity(expected_samples),
        }
    }

    pub fn with_timestamp_bits(mut self, bits: u32) -> Self {
        self.timestamp_bits = bits;
        self
    }

    /// Add a sample to the waveform.
    ///
    /// Fails when the event is already full, or when the gap to the previous sample is
    /// larger than the machine-gun window. In the latter case all held samples are
    /// discarded. Either way the caller should start a fresh event with this sample.
    pub fn add_sample(&mut self, timestamp: u64, adc: u16) -> Result<(), SampleError> {
        if self.samples.len() >= self.expected_samples {
            return Err(SampleError::EventFull(self.expected_samples));
        }

        if let Some(last) = self.timestamps.last() {
            // A backwards step wraps to a huge gap and breaks the event as well
            let gap = timestamp_delta(timestamp, *last, self.timestamp_bits);
            if gap > self.max_gap {
                self.timestamps.clear();
                self.samples.clear();
                return Err(SampleError::GapExceeded {
                    gap,
                    max: self.max_gap,
                });
            }
        }

        self.timestamps.push(timestamp);
        self.samples.push(adc);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() == self.expected_samples
    }

    pub fn found_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn expected_samples(&self) -> usize {
        self.expected_samples
    }

    /// Timestamp of the first sample, which keys the event for board level building
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamps.first().copied()
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// The baseline is the first sample
    pub fn pedestal(&self) -> Option<u16> {
        self.samples.first().copied()
    }

    /// Maximum over every sample after the pedestal
    pub fn max_sample(&self) -> Option<u16> {
        self.samples.iter().skip(1).max().copied()
    }

    /// Height of the pulse above the pedestal, never negative
    pub fn max_amplitude(&self) -> Option<u16> {
        Some(self.max_sample()?.saturating_sub(self.pedestal()?))
    }

    /// Flatten into the record handed to persistence
    pub fn to_record(&self) -> ChannelRecord {
        ChannelRecord {
            board_id: self.hardware.board_id,
            asic_id: self.hardware.asic_id,
            channel: self.hardware.channel,
            event_id: self.event_id,
            timestamp: self.timestamp().unwrap_or_default(),
            pedestal: self.pedestal().unwrap_or_default(),
            max_sample: self.max_sample().unwrap_or_default(),
            samples: self.samples.clone(),
        }
    }
}

/// One completed channel event, flattened for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub board_id: u8,
    pub asic_id: u8,
    pub channel: u8,
    pub event_id: u64,
    pub timestamp: u64,
    pub pedestal: u16,
    pub max_sample: u16,
    pub samples: Vec<u16>,
}
