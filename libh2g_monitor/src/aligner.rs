//! Greedy online matching of board events across boards with independent clocks.
//!
//! Every board runs a free counter with an unknown offset to the others. The aligner keeps a
//! reference timestamp `t0` per board and compares the offset of each board's oldest
//! pending event to its reference. When all offsets agree within the tolerance, one event
//! per board is emitted and the references are moved to the consumed timestamps, which
//! follows slow drift between the clocks. Disagreeing events are dropped, never retried.
//!
//! Offsets are taken on the width of the board counters, so boards whose counters wrap at
//! different moments stay aligned.
use std::collections::VecDeque;

use super::board_event::BoardEvent;
use super::decoders::timestamp_offset;

/// One BoardEvent per board, matched in time
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedEvent {
    pub events: Vec<BoardEvent>,
}

impl AlignedEvent {
    pub fn timestamps(&self) -> Vec<u64> {
        self.events.iter().map(|e| e.timestamp).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CrossBoardAligner {
    tolerance: u64,
    timestamp_bits: u32,
    t0: Option<Vec<u64>>,
    pending: Vec<VecDeque<BoardEvent>>,
    aligned_events: u64,
    dropped_events: u64,
}

impl CrossBoardAligner {
    pub fn new(num_boards: usize, tolerance: u64) -> Self {
        Self {
            tolerance,
            timestamp_bits: 64,
            t0: None,
            pending: vec![VecDeque::new(); num_boards],
            aligned_events: 0,
            dropped_events: 0,
        }
    }

    pub fn with_timestamp_bits(mut self, bits: u32) -> Self {
        self.timestamp_bits = bits;
        self
    }

    /// Queue a completed board event. Events for unknown boards are ignored.
    pub fn push(&mut self, board: usize, event: BoardEvent) {
        match self.pending.get_mut(board) {
            Some(queue) => queue.push_back(event),
            None => log::warn!("Aligner has no queue for board {board}"),
        }
    }

    /// Match as many events as possible with what is queued.
    ///
    /// Returns when any board runs out of pending events. Left over events stay queued
    /// for the next pass.
    pub fn align(&mut self) -> Vec<AlignedEvent> {
        let mut aligned = Vec::new();
        while let Some(offsets) = self.front_offsets() {
            let (min, max) = min_max(&offsets);
            if max.saturating_sub(min) < self.tolerance as i64 {
                aligned.push(self.pop_aligned());
                continue;
            }

            // Stale events from before the reference are skipped first
            let mut fast_forwarded = false;
            for (board, offset) in offsets.iter().enumerate() {
                if *offset < 0 {
                    self.fast_forward(board);
                    fast_forwarded = true;
                }
            }
            if fast_forwarded {
                continue;
            }

            let mean = offsets.iter().map(|o| *o as f64).sum::<f64>() / offsets.len() as f64;
            let mut worst = 0;
            let mut worst_deviation = 0.0f64;
            for (board, offset) in offsets.iter().enumerate() {
                let deviation = *offset as f64 - mean;
                // Strict comparison keeps the lowest board on ties
                if deviation.abs() > worst_deviation.abs() {
                    worst = board;
                    worst_deviation = deviation;
                }
            }

            if worst_deviation > 0.0 {
                // Ahead of the group; everyone else catches up
                for board in 0..self.pending.len() {
                    if board != worst {
                        self.drop_front(board);
                    }
                }
            } else {
                self.drop_front(worst);
            }
        }

        self.aligned_events += aligned.len() as u64;
        aligned
    }

    /// Offset of every board's front event to its reference, or None if any queue is empty.
    /// The references are taken from the very first fronts seen.
    fn front_offsets(&mut self) -> Option<Vec<i64>> {
        let fronts: Vec<u64> = self
            .pending
            .iter()
            .map(|q| q.front().map(|e| e.timestamp))
            .collect::<Option<Vec<u64>>>()?;
        if fronts.is_empty() {
            return None;
        }
        let bits = self.timestamp_bits;
        let t0 = self.t0.get_or_insert_with(|| fronts.clone());
        Some(
            fronts
                .iter()
                .zip(t0.iter())
                .map(|(ts, t0)| timestamp_offset(*ts, *t0, bits))
                .collect(),
        )
    }

    fn pop_aligned(&mut self) -> AlignedEvent {
        let events: Vec<BoardEvent> = self
            .pending
            .iter_mut()
            .filter_map(|q| q.pop_front())
            .collect();
        if let Some(t0) = self.t0.as_mut() {
            for (reference, event) in t0.iter_mut().zip(events.iter()) {
                *reference = event.timestamp;
            }
        }
        AlignedEvent { events }
    }

    fn fast_forward(&mut self, board: usize) {
        let reference = match self.t0.as_ref().and_then(|t0| t0.get(board)) {
            Some(t) => *t,
            None => return,
        };
        let bits = self.timestamp_bits;
        while self.pending[board]
            .front()
            .is_some_and(|e| timestamp_offset(e.timestamp, reference, bits) < 0)
        {
            self.drop_front(board);
        }
    }

    fn drop_front(&mut self, board: usize) {
        if let Some(event) = self.pending[board].pop_front() {
            log::trace!(
                "Dropping unaligned event on board {} at {}",
                event.board_id,
                event.timestamp
            );
            self.dropped_events += 1;
        }
    }

    pub fn pending(&self, board: usize) -> usize {
        self.pending.get(board).map_or(0, |q| q.len())
    }

    pub fn reference(&self) -> Option<&[u64]> {
        self.t0.as_deref()
    }

    pub fn aligned_events(&self) -> u64 {
        self.aligned_events
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }
}

fn min_max(values: &[i64]) -> (i64, i64) {
    values
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}
