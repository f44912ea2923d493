use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use super::config::Config;
use super::error::ProcessorError;
use super::file_stream::{FileStream, PacketSource, ReadStatus};
use super::monitor::OnlineMonitor;
use super::sink::{MonitorSink, SummarySink};
use super::worker_status::{WorkerPhase, WorkerStatus};

fn send_status(
    tx: &Sender<WorkerStatus>,
    config: &Config,
    monitor: &OnlineMonitor,
    progress: f32,
    phase: WorkerPhase,
) -> Result<(), ProcessorError> {
    tx.send(WorkerStatus::new(
        progress.clamp(0.0, 1.0),
        config.run_number,
        monitor.packets(),
        monitor.aligner().aligned_events(),
        phase,
    ))?;
    Ok(())
}

/// Drive the monitor from any packet source until it runs dry.
///
/// In follow mode the source is polled again after `poll_interval_ms` when no full packet
/// is available, up to `max_idle_polls` times in a row (0 polls forever). Alignment and
/// statistics are refreshed every `refresh_interval_secs`, and once more at the end.
pub fn process_source(
    config: &Config,
    source: &mut dyn PacketSource,
    total_bytes: u64,
    tx: &Sender<WorkerStatus>,
    sink: &mut dyn MonitorSink,
) -> Result<OnlineMonitor, ProcessorError> {
    let mut monitor = OnlineMonitor::new(config)?;
    let mut buffer = vec![0u8; config.packet_size];
    let refresh_interval = Duration::from_secs(config.refresh_interval_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let progress = |source: &dyn PacketSource| {
        if total_bytes == 0 {
            0.0
        } else {
            source.bytes_read() as f32 / total_bytes as f32
        }
    };

    let mut last_refresh = Instant::now();
    let mut idle_polls: u32 = 0;
    send_status(tx, config, &monitor, 0.0, WorkerPhase::Reading)?;
    loop {
        match source.read_packet(&mut buffer)? {
            ReadStatus::Packet => {
                idle_polls = 0;
                if let Err(e) = monitor.process_packet(&buffer, sink) {
                    log::warn!("Failed to read packet: {e}");
                }
            }
            ReadStatus::Heartbeat(heartbeat) => {
                idle_polls = 0;
                monitor.record_heartbeat(heartbeat);
            }
            ReadStatus::WouldBlock => {
                if !config.follow {
                    break;
                }
                if config.max_idle_polls != 0 && idle_polls >= config.max_idle_polls {
                    log::info!("No new data after {idle_polls} polls, stopping.");
                    break;
                }
                idle_polls += 1;
                send_status(
                    tx,
                    config,
                    &monitor,
                    progress(&*source),
                    WorkerPhase::Waiting,
                )?;
                std::thread::sleep(poll_interval);
            }
        }

        if last_refresh.elapsed() >= refresh_interval {
            monitor.refresh(sink);
            send_status(
                tx,
                config,
                &monitor,
                progress(&*source),
                WorkerPhase::Reading,
            )?;
            last_refresh = Instant::now();
        }
    }

    monitor.refresh(sink);
    monitor.log_loss_summary();
    log::info!(
        "Aligned {} events, dropped {} unaligned board events.",
        monitor.aligner().aligned_events(),
        monitor.aligner().dropped_events()
    );
    send_status(tx, config, &monitor, 1.0, WorkerPhase::Finished)?;
    Ok(monitor)
}

/// The main loop of the monitor.
///
/// Opens the run file named by the config and processes it into the given sink.
pub fn process_run(
    config: &Config,
    tx: &Sender<WorkerStatus>,
    sink: &mut dyn MonitorSink,
) -> Result<OnlineMonitor, ProcessorError> {
    let run_path = config.get_run_file();
    let mut stream = FileStream::new(&run_path)?;
    let total_bytes = stream.size_bytes()?;
    log::info!(
        "Processing {} ({})",
        run_path.to_string_lossy(),
        human_bytes::human_bytes(total_bytes as f64)
    );
    if stream.preamble_size() > 0 {
        log::info!("Skipped a {} byte text preamble", stream.preamble_size());
    }
    process_source(config, &mut stream, total_bytes, tx, sink)
}

/// The function to be called by a separate thread (typically the CLI).
///
/// Runs the configured run through a SummarySink and returns the final counts.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<SummarySink, ProcessorError> {
    let mut sink = SummarySink::default();
    log::info!("Processing run {}...", config.run_number);
    process_run(&config, &tx, &mut sink)?;
    log::info!(
        "Finished processing run {}: {} channel events, {} aligned events.",
        config.run_number,
        sink.channel_records,
        sink.aligned_events
    );
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::line::Line;
    use crate::packet::{encode_legacy_packet, Heartbeat};
    use std::sync::mpsc;

    fn test_config(run_number: i32) -> Config {
        Config {
            data_path: std::env::temp_dir(),
            run_number,
            protocol: Protocol::Legacy,
            num_boards: 1,
            num_asics: 1,
            channels_per_asic: 36,
            expected_samples: 4,
            ..Default::default()
        }
    }

    fn run_bytes() -> Vec<u8> {
        let mut bytes = b"# test run\n".to_vec();
        let lines: Vec<Line> = (0..4u32)
            .flat_map(|k| {
                (0..5u8).map(move |line_number| Line {
                    asic_id: Some(0),
                    board_id: Some(0),
                    half_id: Some(0),
                    line_number,
                    timestamp: 200 + k,
                    payload: [(20 + k) << 20; 8],
                })
            })
            .collect();
        bytes.extend(encode_legacy_packet(0, 0, &lines));
        bytes.extend(Heartbeat {
            seconds: 3,
            milliseconds: 4,
        }
        .to_bytes(1452));
        bytes
    }

    #[test]
    fn test_process_run_file() {
        let config = test_config(9_000 + (std::process::id() % 1000) as i32);
        let path = config.get_run_file();
        std::fs::write(&path, run_bytes()).unwrap();

        let (tx, rx) = mpsc::channel();
        let mut sink = SummarySink::default();
        let monitor = process_run(&config, &tx, &mut sink).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(monitor.packets(), 1);
        assert_eq!(monitor.packet_loss().heartbeats(), 1);
        assert_eq!(sink.channel_records, 36);
        assert_eq!(sink.aligned_events, 1);

        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        let last = statuses.last().unwrap();
        assert_eq!(last.phase, WorkerPhase::Finished);
        assert_eq!(last.packets, 1);
        assert_eq!(last.aligned_events, 1);
    }

    #[test]
    fn test_follow_gives_up_after_idle_polls() {
        let mut config = test_config(8_000 + (std::process::id() % 1000) as i32);
        config.follow = true;
        config.poll_interval_ms = 1;
        config.max_idle_polls = 3;
        let path = config.get_run_file();
        std::fs::write(&path, run_bytes()).unwrap();

        let (tx, rx) = mpsc::channel();
        let monitor = process_run(&config, &tx, &mut SummarySink::default()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(monitor.packets(), 1);
        let waiting = rx
            .try_iter()
            .filter(|s| s.phase == WorkerPhase::Waiting)
            .count();
        assert_eq!(waiting, 3);
    }

    #[test]
    fn test_missing_run_file() {
        let config = test_config(-1);
        let (tx, _rx) = mpsc::channel();
        let result = process_run(&config, &tx, &mut SummarySink::default());
        assert!(matches!(result, Err(ProcessorError::FileStreamError(_))));
    }
}
