use bit_set::BitSet;

use super::channel_event::ChannelEvent;
use super::hardware_id::ChannelLayout;

/// BoardEvent collects the channel events of one board that share a timestamp.
///
/// Each (asic, channel) pair of the board owns one slot. The event is complete once every
/// slot has been filled.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEvent {
    pub timestamp: u64,
    pub board_id: u8,
    channels: Vec<Option<ChannelEvent>>,
    filled: BitSet,
}

impl BoardEvent {
    pub fn new(timestamp: u64, board_id: u8, channels_per_board: usize) -> Self {
        Self {
            timestamp,
            board_id,
            channels: vec![None; channels_per_board],
            filled: BitSet::with_capacity(channels_per_board),
        }
    }

    /// Place a channel event in its slot.
    ///
    /// Returns false if the event does not belong to this board layout. A second event for
    /// a slot that is already filled replaces the first and does not count twice.
    pub fn fill(&mut self, layout: &ChannelLayout, event: ChannelEvent) -> bool {
        let slot = match layout.board_slot(&event.hardware) {
            Some(slot) if slot < self.channels.len() => slot,
            _ => return false,
        };
        if !self.filled.insert(slot) {
            log::debug!(
                "Duplicate hit on {} for timestamp {}",
                event.hardware,
                self.timestamp
            );
        }
        self.channels[slot] = Some(event);
        true
    }

    pub fn found(&self) -> usize {
        self.filled.len()
    }

    pub fn expected(&self) -> usize {
        self.channels.len()
    }

    pub fn is_complete(&self) -> bool {
        self.found() == self.expected()
    }

    pub fn channel(&self, slot: usize) -> Option<&ChannelEvent> {
        self.channels.get(slot).and_then(|c| c.as_ref())
    }

    /// Iterate over the filled slots in slot order
    pub fn channels(&self) -> impl Iterator<Item = &ChannelEvent> {
        self.channels.iter().filter_map(|c| c.as_ref())
    }

    /// Slots that have not received a channel event yet
    pub fn missing_slots(&self) -> Vec<usize> {
        (0..self.channels.len())
            .filter(|slot| !self.filled.contains(*slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware_id::HardwareID;

    fn hit(layout: &ChannelLayout, asic: u8, channel: u8, ts: u64) -> ChannelEvent {
        let mut event = ChannelEvent::new(HardwareID::new(0, asic, channel), 0, 1, 10);
        event.add_sample(ts, 42).unwrap();
        assert!(layout.board_slot(&event.hardware).is_some());
        event
    }

    #[test]
    fn test_fill_all_slots() {
        let layout = ChannelLayout::new(1, 2, 36);
        let mut event = BoardEvent::new(100, 0, layout.channels_per_board());
        for asic in 0..2 {
            for channel in 0..36 {
                assert!(!event.is_complete());
                assert!(event.fill(&layout, hit(&layout, asic, channel, 100)));
            }
        }
        assert!(event.is_complete());
        assert_eq!(event.channels().count(), 72);
        assert_eq!(event.channel(36).unwrap().hardware, HardwareID::new(0, 1, 0));
        assert!(event.missing_slots().is_empty());
    }

    #[test]
    fn test_duplicate_does_not_count() {
        let layout = ChannelLayout::new(1, 1, 36);
        let mut event = BoardEvent::new(5, 0, layout.channels_per_board());
        event.fill(&layout, hit(&layout, 0, 3, 5));
        event.fill(&layout, hit(&layout, 0, 3, 5));
        assert_eq!(event.found(), 1);
        assert_eq!(event.missing_slots().len(), 35);
    }

    #[test]
    fn test_out_of_layout_rejected() {
        let layout = ChannelLayout::new(1, 1, 36);
        let mut event = BoardEvent::new(5, 0, layout.channels_per_board());
        let mut stray = ChannelEvent::new(HardwareID::new(0, 1, 0), 0, 1, 10);
        stray.add_sample(5, 1).unwrap();
        assert!(!event.fill(&layout, stray));
        assert_eq!(event.found(), 0);
    }
}
