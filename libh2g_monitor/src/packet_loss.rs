use fxhash::FxHashMap;

use super::config::Protocol;
use super::packet::{Heartbeat, PacketHeader};

/// Sequence accounting for the packets of one board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketLossStats {
    pub last_sequence: Option<u32>,
    /// Packets received plus packets inferred missing from sequence gaps
    pub total_packets: u64,
    pub received_packets: u64,
    pub missed_packets: u64,
    /// Number of discontinuities, not the number of packets lost in them
    pub gaps: u64,
    pub out_of_order: u64,
}

impl PacketLossStats {
    /// Account for one packet sequence number. `modulus` is the sequence counter range.
    fn record(&mut self, sequence: u32, modulus: u64) {
        self.received_packets += 1;
        self.total_packets += 1;

        let last = match self.last_sequence.replace(sequence) {
            Some(last) => last,
            None => return,
        };

        let diff = (sequence as u64 + modulus - last as u64) % modulus;
        if diff == 1 {
            return;
        }
        self.gaps += 1;
        if diff == 0 || diff > modulus / 2 {
            // Repeated or backwards; nothing is known to be missing
            self.out_of_order += 1;
        } else {
            self.missed_packets += diff - 1;
            self.total_packets += diff - 1;
        }
    }

    pub fn missed_fraction(&self) -> f64 {
        if self.total_packets == 0 {
            0.0
        } else {
            self.missed_packets as f64 / self.total_packets as f64
        }
    }
}

/// PacketLossTracker follows the packet sequence numbers of every board.
///
/// Heartbeats never take part in sequence accounting, the latest one is kept for display.
#[derive(Debug, Clone)]
pub struct PacketLossTracker {
    modulus: u64,
    boards: FxHashMap<u8, PacketLossStats>,
    heartbeats: u64,
    last_heartbeat: Option<Heartbeat>,
}

impl PacketLossTracker {
    pub fn new(protocol: Protocol) -> Self {
        let modulus = match protocol {
            Protocol::Legacy => 1u64 << 16,
            Protocol::V013 => 1u64 << 32,
        };
        Self {
            modulus,
            boards: FxHashMap::default(),
            heartbeats: 0,
            last_heartbeat: None,
        }
    }

    pub fn record_packet(&mut self, header: &PacketHeader) {
        self.boards
            .entry(header.board_id)
            .or_default()
            .record(header.sequence, self.modulus);
    }

    pub fn record_heartbeat(&mut self, heartbeat: Heartbeat) {
        self.heartbeats += 1;
        self.last_heartbeat = Some(heartbeat);
    }

    pub fn stats(&self, board_id: u8) -> Option<&PacketLossStats> {
        self.boards.get(&board_id)
    }

    /// Per board statistics sorted by board id
    pub fn board_stats(&self) -> Vec<(u8, PacketLossStats)> {
        let mut stats: Vec<(u8, PacketLossStats)> =
            self.boards.iter().map(|(id, s)| (*id, *s)).collect();
        stats.sort_by_key(|(id, _)| *id);
        stats
    }

    /// Statistics summed over all boards. The last_sequence of the sum is meaningless and
    /// left empty.
    pub fn totals(&self) -> PacketLossStats {
        self.boards
            .values()
            .fold(PacketLossStats::default(), |mut acc, s| {
                acc.total_packets += s.total_packets;
                acc.received_packets += s.received_packets;
                acc.missed_packets += s.missed_packets;
                acc.gaps += s.gaps;
                acc.out_of_order += s.out_of_order;
                acc
            })
    }

    pub fn missed_fraction(&self) -> f64 {
        self.totals().missed_fraction()
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    pub fn last_heartbeat(&self) -> Option<&Heartbeat> {
        self.last_heartbeat.as_ref()
    }
}
