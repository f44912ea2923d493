use super::aligner::AlignedEvent;
use super::channel_event::ChannelRecord;
use super::decoders::ChannelWord;
use super::event_builder::BuilderStats;
use super::hardware_id::HardwareID;

/// MonitorSink receives everything the monitor produces for display or persistence.
///
/// Every method defaults to doing nothing, so a consumer only implements what it draws.
pub trait MonitorSink {
    /// A decoded readout word whose ADC is above the readout threshold
    fn fill_readout(&mut self, _id: &HardwareID, _word: &ChannelWord) {}

    /// One waveform point of a completed channel event
    fn fill_waveform(&mut self, _id: &HardwareID, _sample_index: usize, _adc: u16) {}

    /// Pulse height above pedestal of a completed channel event
    fn fill_max_amplitude(&mut self, _id: &HardwareID, _amplitude: u16) {}

    /// One flattened record per completed channel event
    fn record_channel_event(&mut self, _record: &ChannelRecord) {}

    /// Periodic per-board event building counters
    fn board_stats(&mut self, _stats: &BuilderStats) {}

    fn aligned_event(&mut self, _event: &AlignedEvent) {}
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MonitorSink for NullSink {}

/// Sink that only counts what passed through it
#[derive(Debug, Clone, Default)]
pub struct SummarySink {
    pub readout_fills: u64,
    pub waveform_fills: u64,
    pub channel_records: u64,
    pub aligned_events: u64,
    pub last_stats: Vec<BuilderStats>,
}

impl MonitorSink for SummarySink {
    fn fill_readout(&mut self, _id: &HardwareID, _word: &ChannelWord) {
        self.readout_fills += 1;
    }

    fn fill_waveform(&mut self, _id: &HardwareID, _sample_index: usize, _adc: u16) {
        self.waveform_fills += 1;
    }

    fn record_channel_event(&mut self, _record: &ChannelRecord) {
        self.channel_records += 1;
    }

    fn board_stats(&mut self, stats: &BuilderStats) {
        match self
            .last_stats
            .iter_mut()
            .find(|s| s.board_id == stats.board_id)
        {
            Some(last) => *last = *stats,
            None => self.last_stats.push(*stats),
        }
    }

    fn aligned_event(&mut self, _event: &AlignedEvent) {
        self.aligned_events += 1;
    }
}
