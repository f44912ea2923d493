use std::collections::VecDeque;

use super::channel_event::ChannelEvent;
use super::decoders::ChannelWord;
use super::hardware_id::HardwareID;

/// ChannelStream turns the samples of one channel into complete waveform events.
///
/// Completed events are queued until the monitor hands them to the board level
/// EventBuilder.
#[derive(Debug, Clone)]
pub struct ChannelStream {
    hardware: HardwareID,
    expected_samples: usize,
    max_gap: u64,
    timestamp_bits: u32,
    current_event: Option<ChannelEvent>,
    completed_events: VecDeque<ChannelEvent>,
    events: u64,
    broken_events: u64,
    last_readout: Option<ChannelWord>,
}

impl ChannelStream {
    pub fn new(hardware: HardwareID, expected_samples: usize, max_gap: u64) -> Self {
        Self {
            hardware,
            expected_samples,
            max_gap,
            timestamp_bits: 64,
            current_event: None,
            completed_events: VecDeque::new(),
            events: 0,
            broken_events: 0,
            last_readout: None,
        }
    }

    /// Width of the timestamp counter feeding this channel
    pub fn with_timestamp_bits(mut self, bits: u32) -> Self {
        self.timestamp_bits = bits;
        self
    }

    /// Add a sample to the event under construction.
    ///
    /// A rejected sample closes the current event and is retried once on a fresh event.
    /// A fresh event always accepts its first sample, so the retry cannot fail.
    pub fn construct_event(&mut self, timestamp: u64, adc: u16) {
        for _attempt in 0..2 {
            let (hardware, event_id) = (self.hardware, self.events);
            let (expected, max_gap, bits) =
                (self.expected_samples, self.max_gap, self.timestamp_bits);
            let event = self.current_event.get_or_insert_with(|| {
                ChannelEvent::new(hardware, event_id, expected, max_gap).with_timestamp_bits(bits)
            });

            match event.add_sample(timestamp, adc) {
                Ok(()) => {
                    if event.is_complete() {
                        if let Some(done) = self.current_event.take() {
                            self.completed_events.push_back(done);
                            self.events += 1;
                        }
                    }
                    return;
                }
                Err(e) => {
                    log::trace!("Restarting event on {}: {e}", self.hardware);
                    self.broken_events += 1;
                    self.current_event = None;
                }
            }
        }
    }

    /// Keep the last decoded readout word of this channel
    pub fn fill_readout(&mut self, word: ChannelWord) {
        self.last_readout = Some(word);
    }

    pub fn last_readout(&self) -> Option<&ChannelWord> {
        self.last_readout.as_ref()
    }

    pub fn has_events(&self) -> bool {
        !self.completed_events.is_empty()
    }

    pub fn completed_event_size(&self) -> usize {
        self.completed_events.len()
    }

    /// Take the oldest completed event
    pub fn get_event(&mut self) -> Option<ChannelEvent> {
        self.completed_events.pop_front()
    }

    pub fn hardware(&self) -> &HardwareID {
        &self.hardware
    }

    /// Number of completed events
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Number of events restarted due to a broken machine-gun sequence
    pub fn broken_events(&self) -> u64 {
        self.broken_events
    }

    pub fn current_samples(&self) -> usize {
        self.current_event
            .as_ref()
            .map_or(0, |e| e.found_samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_stream() -> ChannelStream {
        ChannelStream::new(HardwareID::new(1, 0, 12), 5, 100)
    }

    #[test]
    fn test_single_event() {
        let mut stream = make_stream();
        for i in 0..5u64 {
            stream.construct_event(1000 + i * 25, 10 + i as u16);
        }
        assert_eq!(stream.completed_event_size(), 1);
        let event = stream.get_event().unwrap();
        assert_eq!(event.samples(), &[10, 11, 12, 13, 14]);
        assert_eq!(event.timestamps(), &[1000, 1025, 1050, 1075, 1100]);
        assert_eq!(event.event_id, 0);
        assert_eq!(stream.current_samples(), 0);
        assert!(!stream.has_events());
    }

    #[test]
    fn test_gap_restarts_with_trigger_sample() {
        let mut stream = make_stream();
        for i in 0..3u64 {
            stream.construct_event(i * 10, 1);
        }
        // Far outside the window: the three samples are lost and this one starts anew
        stream.construct_event(10_000, 2);
        assert_eq!(stream.broken_events(), 1);
        assert_eq!(stream.current_samples(), 1);
        for i in 1..5u64 {
            stream.construct_event(10_000 + i, 3);
        }
        let event = stream.get_event().unwrap();
        assert_eq!(event.timestamp(), Some(10_000));
        assert_eq!(event.samples(), &[2, 3, 3, 3, 3]);
    }

    #[test]
    fn test_event_spans_counter_wrap() {
        let mut stream =
            ChannelStream::new(HardwareID::new(1, 0, 12), 2, 1000).with_timestamp_bits(32);
        stream.construct_event(0xFFFF_FFF0, 1);
        stream.construct_event(0x10, 2);
        assert_eq!(stream.events(), 1);
        assert_eq!(stream.broken_events(), 0);
        let event = stream.get_event().unwrap();
        assert_eq!(event.timestamps(), &[0xFFFF_FFF0, 0x10]);
    }

    #[test]
    fn test_consecutive_events() {
        let mut stream = make_stream();
        for i in 0..15u64 {
            stream.construct_event(i, i as u16);
        }
        assert_eq!(stream.completed_event_size(), 3);
        assert_eq!(stream.events(), 3);
        let ids: Vec<u64> = std::iter::from_fn(|| stream.get_event())
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
