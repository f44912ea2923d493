use super::aligner::{AlignedEvent, CrossBoardAligner};
use super::channel_event::ChannelEvent;
use super::channel_stream::ChannelStream;
use super::config::{Config, Protocol};
use super::constants::LINES_PER_PACKAGE;
use super::error::{ConfigError, PacketError};
use super::event_builder::EventBuilder;
use super::hardware_id::{ChannelLayout, HardwareID};
use super::line::Line;
use super::line_stream::LineStream;
use super::package::Package;
use super::packet::{decode_legacy_lines, is_heartbeat, scan_v013_frames, Heartbeat, PacketHeader};
use super::packet_loss::PacketLossTracker;
use super::sink::MonitorSink;

/// OnlineMonitor owns the whole reconstruction pipeline.
///
/// Packets go in through `process_packet`. Lines are reassembled into packages, package
/// samples build channel events, and completed channel events are grouped into board
/// events right away. Cross-board alignment and statistics only run on `refresh`, which
/// the caller invokes periodically.
///
/// All per-line and per-channel state lives in flat vectors indexed through the
/// ChannelLayout.
#[derive(Debug)]
pub struct OnlineMonitor {
    config: Config,
    layout: ChannelLayout,
    line_streams: Vec<LineStream>,
    channel_streams: Vec<ChannelStream>,
    builders: Vec<EventBuilder>,
    aligner: CrossBoardAligner,
    packet_loss: PacketLossTracker,
    line_rates: Vec<u64>,
    line_numbers: [u64; LINES_PER_PACKAGE],
    dropped_lines: u64,
    packets: u64,
}

impl OnlineMonitor {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = ChannelLayout::from_config(config);
        let timestamp_bits = config.protocol.timestamp_bits();

        let line_streams: Vec<LineStream> = (0..layout.total_line_streams())
            .filter_map(|idx| layout.line_address(idx))
            .map(LineStream::new)
            .collect();
        let channel_streams: Vec<ChannelStream> = (0..layout.total_channels())
            .filter_map(|idx| layout.hardware_id(idx))
            .map(|id| {
                ChannelStream::new(id, config.expected_samples, config.machine_gun_max_time)
                    .with_timestamp_bits(timestamp_bits)
            })
            .collect();
        let builders: Vec<EventBuilder> = (0..layout.num_boards)
            .map(|board| EventBuilder::new(board as u8, layout, config.max_in_progress_events))
            .collect();

        log::info!(
            "Monitoring {} with {} boards x {} ASICs x {} channels ({:?} protocol)",
            config.detector,
            layout.num_boards,
            layout.num_asics,
            layout.channels_per_asic,
            config.protocol
        );

        Ok(Self {
            config: config.clone(),
            layout,
            line_rates: vec![0; line_streams.len()],
            line_streams,
            channel_streams,
            builders,
            aligner: CrossBoardAligner::new(layout.num_boards, config.alignment_tolerance)
                .with_timestamp_bits(timestamp_bits),
            packet_loss: PacketLossTracker::new(config.protocol),
            line_numbers: [0; LINES_PER_PACKAGE],
            dropped_lines: 0,
            packets: 0,
        })
    }

    /// Decode one raw packet and push its content through the pipeline.
    ///
    /// Heartbeats only update the heartbeat record. Bad identifiers or broken line
    /// sequences inside a packet are absorbed; an error is only returned when the packet
    /// itself cannot be framed.
    pub fn process_packet(
        &mut self,
        buffer: &[u8],
        sink: &mut dyn MonitorSink,
    ) -> Result<(), PacketError> {
        if is_heartbeat(buffer) {
            let heartbeat = Heartbeat::decode(buffer)?;
            self.record_heartbeat(heartbeat);
            return Ok(());
        }

        let header =
            PacketHeader::decode(buffer, self.config.protocol, self.config.board_id_offset)?;
        self.packet_loss.record_packet(&header);
        self.packets += 1;

        match self.config.protocol {
            Protocol::Legacy => {
                for line in decode_legacy_lines(buffer)? {
                    self.process_line(&line, sink);
                }
            }
            Protocol::V013 => {
                for frame in scan_v013_frames(buffer) {
                    match frame.into_package(header.board_id) {
                        Some(package)
                            if self.layout.line_index(&package.address).is_some() =>
                        {
                            self.dispatch_package(&package, sink)
                        }
                        _ => self.dropped_lines += LINES_PER_PACKAGE as u64,
                    }
                }
            }
        }
        Ok(())
    }

    pub fn record_heartbeat(&mut self, heartbeat: Heartbeat) {
        match heartbeat.datetime() {
            Some(time) => log::debug!("Heartbeat at {time}"),
            None => log::debug!("Heartbeat with unrepresentable time {heartbeat:?}"),
        }
        self.packet_loss.record_heartbeat(heartbeat);
    }

    /// Route one decoded line to its reassembly stream
    pub fn process_line(&mut self, line: &Line, sink: &mut dyn MonitorSink) {
        let idx = match line.address().and_then(|a| self.layout.line_index(&a)) {
            Some(idx) => idx,
            None => {
                self.dropped_lines += 1;
                return;
            }
        };
        self.line_rates[idx] += 1;
        if let Some(count) = self.line_numbers.get_mut(line.line_number as usize) {
            *count += 1;
        }

        if let Some(package) = self.line_streams[idx].add_line(line) {
            self.dispatch_package(&package, sink);
        }
    }

    /// Hand every channel word of a package to its channel stream
    fn dispatch_package(&mut self, package: &Package, sink: &mut dyn MonitorSink) {
        let address = package.address;
        for (idx, word) in package.channels.iter().enumerate() {
            let id = HardwareID::new(
                address.board_id,
                address.asic_id,
                package.asic_channel(idx) as u8,
            );
            // Halves beyond the configured channel count are not read out
            let channel_idx = match self.layout.channel_index(&id) {
                Some(channel_idx) => channel_idx,
                None => continue,
            };

            if word.adc > self.config.readout_adc_threshold {
                sink.fill_readout(&id, word);
            }

            let stream = &mut self.channel_streams[channel_idx];
            stream.fill_readout(*word);
            stream.construct_event(package.timestamp, word.adc);
            while let Some(event) = stream.get_event() {
                forward_channel_event(&mut self.builders, event, sink);
            }
        }
    }

    /// Run the cross-board alignment over every board event completed since the last call
    pub fn align_events(&mut self, sink: &mut dyn MonitorSink) -> Vec<AlignedEvent> {
        for (board, builder) in self.builders.iter_mut().enumerate() {
            for event in builder.take_completed() {
                self.aligner.push(board, event);
            }
        }
        let aligned = self.aligner.align();
        for event in aligned.iter() {
            sink.aligned_event(event);
        }
        aligned
    }

    pub fn update_stats(&self, sink: &mut dyn MonitorSink) {
        for builder in self.builders.iter() {
            sink.board_stats(&builder.stats());
        }
    }

    /// Periodic point-in-time update: align what is ready and publish statistics
    pub fn refresh(&mut self, sink: &mut dyn MonitorSink) -> Vec<AlignedEvent> {
        let aligned = self.align_events(sink);
        self.update_stats(sink);
        log::debug!(
            "Refresh: {} new aligned events, {} total, {} dropped",
            aligned.len(),
            self.aligner.aligned_events(),
            self.aligner.dropped_events()
        );
        aligned
    }

    /// Write the packet loss summary of every board to the log
    pub fn log_loss_summary(&self) {
        for (board, stats) in self.packet_loss.board_stats() {
            log::info!(
                "Board {board}: {} packets received, {} missed in {} gaps, {} out of order ({:.3}% lost)",
                stats.received_packets,
                stats.missed_packets,
                stats.gaps,
                stats.out_of_order,
                stats.missed_fraction() * 100.0
            );
        }
        log::info!(
            "{} heartbeats, {} lines dropped for bad identifiers",
            self.packet_loss.heartbeats(),
            self.dropped_lines
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn channel_stream(&self, id: &HardwareID) -> Option<&ChannelStream> {
        self.layout
            .channel_index(id)
            .map(|idx| &self.channel_streams[idx])
    }

    pub fn line_streams(&self) -> &[LineStream] {
        &self.line_streams
    }

    pub fn builder(&self, board: usize) -> Option<&EventBuilder> {
        self.builders.get(board)
    }

    pub fn aligner(&self) -> &CrossBoardAligner {
        &self.aligner
    }

    pub fn packet_loss(&self) -> &PacketLossTracker {
        &self.packet_loss
    }

    /// Lines received per stream, indexed like the line streams
    pub fn line_rates(&self) -> &[u64] {
        &self.line_rates
    }

    /// How often each line number was received
    pub fn line_numbers(&self) -> &[u64; LINES_PER_PACKAGE] {
        &self.line_numbers
    }

    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    /// Data packets processed, heartbeats excluded
    pub fn packets(&self) -> u64 {
        self.packets
    }
}

/// Publish a completed channel event and pass it on to its board's builder
fn forward_channel_event(
    builders: &mut [EventBuilder],
    event: ChannelEvent,
    sink: &mut dyn MonitorSink,
) {
    let id = event.hardware;
    sink.record_channel_event(&event.to_record());
    for (idx, adc) in event.samples().iter().enumerate() {
        sink.fill_waveform(&id, idx, *adc);
    }
    if let Some(amplitude) = event.max_amplitude() {
        sink.fill_max_amplitude(&id, amplitude);
    }
    if let Some(builder) = builders.get_mut(id.board_id as usize) {
        builder.channel_hit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CHANNELS_PER_HALF, LINES_PER_PACKET, WORDS_PER_LINE};
    use crate::packet::{encode_legacy_packet, encode_v013_packet, V013Frame};
    use crate::package::empty_grid;
    use crate::sink::{NullSink, SummarySink};

    const SAMPLES: usize = 10;

    fn test_config(num_boards: usize, protocol: Protocol) -> Config {
        Config {
            num_boards,
            protocol,
            expected_samples: SAMPLES,
            ..Default::default()
        }
    }

    /// Lines of `samples` consecutive packages for every (asic, half) of a board
    fn board_lines(board: u8, first_timestamp: u32, samples: usize) -> Vec<Line> {
        let mut lines = Vec::new();
        for k in 0..samples {
            for asic in 0..2 {
                for half in 0..2 {
                    for line_number in 0..5 {
                        lines.push(Line {
                            asic_id: Some(asic),
                            board_id: Some(board),
                            half_id: Some(half),
                            line_number,
                            timestamp: first_timestamp.wrapping_add(25 * k as u32),
                            payload: [(100 + k as u32) << 20; WORDS_PER_LINE],
                        });
                    }
                }
            }
        }
        lines
    }

    fn legacy_packets(board: u8, lines: &[Line]) -> Vec<Vec<u8>> {
        lines
            .chunks(LINES_PER_PACKET)
            .enumerate()
            .map(|(seq, chunk)| encode_legacy_packet(board, seq as u16, chunk))
            .collect()
    }

    #[test]
    fn test_two_board_end_to_end() {
        let config = test_config(2, Protocol::Legacy);
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        let mut sink = SummarySink::default();

        for (board, first_timestamp) in [(0u8, 5000u32), (1, 90_000)] {
            let lines = board_lines(board, first_timestamp, SAMPLES);
            for packet in legacy_packets(board, &lines) {
                monitor.process_packet(&packet, &mut sink).unwrap();
            }
        }

        for board in 0..2 {
            let builder = monitor.builder(board).unwrap();
            assert_eq!(builder.completed_len(), 1);
            assert_eq!(builder.in_progress_len(), 0);
        }
        assert_eq!(sink.channel_records, 2 * 144);
        assert_eq!(sink.waveform_fills, 2 * 144 * SAMPLES as u64);

        let aligned = monitor.refresh(&mut sink);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].timestamps(), vec![5000, 90_000]);
        assert!(aligned[0].events.iter().all(|e| e.is_complete()));
        assert_eq!(sink.aligned_events, 1);
        assert_eq!(sink.last_stats.len(), 2);

        let id = HardwareID::new(1, 1, 71);
        let stream = monitor.channel_stream(&id).unwrap();
        assert_eq!(stream.events(), 1);
        assert_eq!(stream.last_readout().unwrap().adc, 109);

        // 200 lines per board packed in 6 packets with zero filled slots at the end
        assert_eq!(monitor.packets(), 12);
        assert_eq!(monitor.dropped_lines(), 2 * (6 * 36 - 200));
        assert_eq!(monitor.packet_loss().totals().gaps, 0);
        assert_eq!(monitor.line_numbers()[0], 2 * 40);
    }

    #[test]
    fn test_legacy_counter_wrap_on_one_board() {
        let config = test_config(2, Protocol::Legacy);
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        let mut sink = SummarySink::default();

        // Board 0 wraps in the middle of its first waveform, board 1 never wraps
        let first = u32::MAX - 100;
        let second = 0x1000u32;
        let step = second.wrapping_sub(first);
        for (board, t0) in [(0u8, first), (1, 90_000)] {
            let mut lines = board_lines(board, t0, SAMPLES);
            lines.extend(board_lines(board, t0.wrapping_add(step), SAMPLES));
            for packet in legacy_packets(board, &lines) {
                monitor.process_packet(&packet, &mut sink).unwrap();
            }
        }

        let stream = monitor.channel_stream(&HardwareID::new(0, 0, 3)).unwrap();
        assert_eq!(stream.events(), 2);
        assert_eq!(stream.broken_events(), 0);

        let aligned = monitor.refresh(&mut sink);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].timestamps(), vec![first as u64, 90_000]);
        assert_eq!(aligned[1].timestamps(), vec![second as u64, 90_000 + step as u64]);
        assert_eq!(monitor.aligner().dropped_events(), 0);
    }

    #[test]
    fn test_broken_line_sequence_loses_one_sample() {
        let config = test_config(1, Protocol::Legacy);
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        let mut lines = board_lines(0, 1000, SAMPLES);
        // Line 1 of the first (asic 0, half 0) package goes missing
        lines.remove(1);
        for packet in legacy_packets(0, &lines) {
            monitor.process_packet(&packet, &mut NullSink).unwrap();
        }
        let broken: u64 = monitor.line_streams().iter().map(|s| s.broken_packages()).sum();
        assert_eq!(broken, 1);

        // Those 36 channels start one sample late and are still in progress
        let late = monitor.channel_stream(&HardwareID::new(0, 0, 0)).unwrap();
        assert_eq!(late.events(), 0);
        assert_eq!(late.current_samples(), SAMPLES - 1);
        let on_time = monitor.channel_stream(&HardwareID::new(0, 0, 36)).unwrap();
        assert_eq!(on_time.events(), 1);
        assert_eq!(monitor.builder(0).unwrap().completed_len(), 0);
    }

    #[test]
    fn test_heartbeat_and_sequence_gap() {
        let config = test_config(1, Protocol::Legacy);
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        let heartbeat = Heartbeat {
            seconds: 100,
            milliseconds: 1,
        };
        monitor
            .process_packet(&heartbeat.to_bytes(config.packet_size), &mut NullSink)
            .unwrap();
        for seq in [0u16, 1, 4] {
            let packet = encode_legacy_packet(0, seq, &[]);
            monitor.process_packet(&packet, &mut NullSink).unwrap();
        }
        assert_eq!(monitor.packets(), 3);
        assert_eq!(monitor.packet_loss().heartbeats(), 1);
        let stats = monitor.packet_loss().stats(0).unwrap();
        assert_eq!(stats.gaps, 1);
        assert_eq!(stats.missed_packets, 2);
    }

    #[test]
    fn test_short_packet_rejected() {
        let config = test_config(1, Protocol::Legacy);
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        assert!(monitor.process_packet(&[0u8; 8], &mut NullSink).is_err());
        assert_eq!(monitor.packets(), 0);
    }

    #[test]
    fn test_v013_single_board() {
        let config = Config {
            num_boards: 1,
            num_asics: 1,
            channels_per_asic: CHANNELS_PER_HALF,
            protocol: Protocol::V013,
            expected_samples: 3,
            ..Default::default()
        };
        let mut monitor = OnlineMonitor::new(&config).unwrap();
        let mut sink = SummarySink::default();

        let frames: Vec<V013Frame> = (0..3u64)
            .map(|k| {
                let mut words = empty_grid();
                words.fill(((10 * (k as u32 + 1)) << 20) | 7);
                V013Frame {
                    asic_id: Some(0),
                    half_id: Some(0),
                    trigger_in: k as u32,
                    trigger_out: k as u32,
                    event_counter: k as u32,
                    timestamp: 1_000_000 + k * 40,
                    words,
                }
            })
            .collect();
        let packet = encode_v013_packet(0, 77, config.board_id_offset, &frames);
        monitor.process_packet(&packet, &mut sink).unwrap();

        assert_eq!(sink.channel_records, 36);
        let stream = monitor.channel_stream(&HardwareID::new(0, 0, 5)).unwrap();
        assert_eq!(stream.events(), 1);
        assert_eq!(monitor.builder(0).unwrap().completed_len(), 1);
        assert_eq!(
            monitor.packet_loss().stats(0).unwrap().last_sequence,
            Some(77)
        );
        assert_eq!(monitor.refresh(&mut sink).len(), 1);
    }
}
