use std::collections::VecDeque;

use time::OffsetDateTime;

use super::board_event::BoardEvent;
use super::channel_event::ChannelEvent;
use super::hardware_id::ChannelLayout;

/// Point-in-time counters of one board's EventBuilder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderStats {
    pub board_id: u8,
    pub attempted: u64,
    pub completed: u64,
    pub evicted: u64,
    pub in_progress: usize,
    pub time: OffsetDateTime,
}

impl BuilderStats {
    /// Fraction of attempted board events that did not complete (yet)
    pub fn incomplete_fraction(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            1.0 - self.completed as f64 / self.attempted as f64
        }
    }
}

/// EventBuilder takes completed ChannelEvents of one board and composes them into BoardEvents.
///
/// Channel events are grouped by the timestamp of their first sample. A BoardEvent moves to
/// the completed queue once every channel of the board has reported; the aligner consumes
/// from there. The in-progress list is bounded by `max_in_progress`, the oldest entries are
/// evicted past that.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    board_id: u8,
    layout: ChannelLayout,
    max_in_progress: usize,
    in_progress: VecDeque<BoardEvent>,
    completed: VecDeque<BoardEvent>,
    attempted: u64,
    completed_count: u64,
    evicted: u64,
}

impl EventBuilder {
    /// Create a new EventBuilder.
    ///
    /// Requires the ChannelLayout to know how many channels make a board event
    pub fn new(board_id: u8, layout: ChannelLayout, max_in_progress: usize) -> Self {
        EventBuilder {
            board_id,
            layout,
            max_in_progress,
            in_progress: VecDeque::new(),
            completed: VecDeque::new(),
            attempted: 0,
            completed_count: 0,
            evicted: 0,
        }
    }

    /// Add a completed channel event to the board event with the same timestamp.
    ///
    /// The in-progress list is searched from the most recently added entry, since hits for
    /// one trigger arrive close together. If no board event has this timestamp a new one is
    /// started.
    pub fn channel_hit(&mut self, event: ChannelEvent) {
        let timestamp = match event.timestamp() {
            Some(ts) => ts,
            None => return,
        };
        if event.hardware.board_id != self.board_id {
            log::warn!(
                "EventBuilder for board {} received a hit from {}",
                self.board_id,
                event.hardware
            );
            return;
        }

        if let Some(idx) = self
            .in_progress
            .iter()
            .rposition(|e| e.timestamp == timestamp)
        {
            self.in_progress[idx].fill(&self.layout, event);
            if self.in_progress[idx].is_complete() {
                if let Some(done) = self.in_progress.remove(idx) {
                    self.completed.push_back(done);
                    self.completed_count += 1;
                }
            }
            return;
        }

        let mut board_event =
            BoardEvent::new(timestamp, self.board_id, self.layout.channels_per_board());
        if !board_event.fill(&self.layout, event) {
            return;
        }
        self.attempted += 1;
        if board_event.is_complete() {
            // Single channel boards complete immediately
            self.completed.push_back(board_event);
            self.completed_count += 1;
            return;
        }
        self.in_progress.push_back(board_event);

        while self.in_progress.len() > self.max_in_progress {
            if let Some(stale) = self.in_progress.pop_front() {
                log::debug!(
                    "Evicting board {} event at {} with {}/{} channels",
                    self.board_id,
                    stale.timestamp,
                    stale.found(),
                    stale.expected()
                );
                self.evicted += 1;
            }
        }
    }

    /// Oldest completed board event
    pub fn front(&self) -> Option<&BoardEvent> {
        self.completed.front()
    }

    pub fn pop_completed(&mut self) -> Option<BoardEvent> {
        self.completed.pop_front()
    }

    /// Hand over every completed board event, oldest first
    pub fn take_completed(&mut self) -> Vec<BoardEvent> {
        self.completed.drain(..).collect()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    pub fn board_id(&self) -> u8 {
        self.board_id
    }

    pub fn stats(&self) -> BuilderStats {
        BuilderStats {
            board_id: self.board_id,
            attempted: self.attempted,
            completed: self.completed_count,
            evicted: self.evicted,
            in_progress: self.in_progress.len(),
            time: OffsetDateTime::now_utc(),
        }
    }
}
