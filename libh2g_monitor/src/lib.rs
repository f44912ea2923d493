//! # h2g_monitor
//!
//! h2g_monitor is the online decoding and event reconstruction core for the H2GCROC
//! calorimeter test beam readout, written in Rust. It takes the raw packet stream written
//! by the readout boards (a finished run file or one still being written) and turns it
//! into per-channel waveforms, per-board events, and events aligned across boards, while
//! keeping track of packet loss.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI monitor use `cargo install --path ./h2g_monitor_cli` from
//! the top level repository. To use the CLI see the `h2g_monitor_cli` README.
//!
//! ## Pipeline
//!
//! Data flows strictly upward, and every stage owns the partial state for its own keys:
//!
//! ```text
//! packet bytes -> Line -> LineStream (board, asic, half) -> Package
//!     -> ChannelStream (board, asic, channel) -> ChannelEvent
//!     -> EventBuilder (board) -> BoardEvent
//!     -> CrossBoardAligner -> AlignedEvent
//! ```
//!
//! Packet sequence numbers are followed alongside by the PacketLossTracker. The
//! [`monitor::OnlineMonitor`] owns all of it; display and persistence consumers implement
//! [`sink::MonitorSink`].
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! data_path: /path/to/runs
//! run_number: 12
//! follow: false
//! protocol: legacy
//! detector: lfhcal
//! num_boards: 4
//! num_asics: 2
//! channels_per_asic: 72
//! expected_samples: 20
//! machine_gun_max_time: 1000
//! alignment_tolerance: 5
//! packet_size: 1452
//! board_id_offset: 4
//! max_in_progress_events: 4096
//! refresh_interval_secs: 4
//! readout_adc_threshold: 5
//! poll_interval_ms: 1000
//! max_idle_polls: 0
//! ```
//!
//! Missing keys take the values shown. Unknown keys are reported as warnings. The run file
//! read is `data_path/RunNNN.h2g`.
//!
//! ## Packet Formats
//!
//! - `legacy`: fixed size packets with a big-endian 16-bit sequence number at byte 2 and
//! the board id at byte 1, followed by 36 line records of 40 bytes from byte 12.
//! - `v013`: a big-endian 32-bit packet number at byte 0, the board id in the low nibble
//! of byte `board_id_offset`, then frames each starting with the sync marker `0xAA 0x5A`.
//!
//! Packets starting with `HRTB` are heartbeats and carry a wall clock time instead of data.
pub mod aligner;
pub mod board_event;
pub mod channel_event;
pub mod channel_stream;
pub mod config;
pub mod constants;
pub mod decoders;
pub mod error;
pub mod event_builder;
pub mod file_stream;
pub mod hardware_id;
pub mod line;
pub mod line_stream;
pub mod monitor;
pub mod package;
pub mod packet;
pub mod packet_loss;
pub mod process;
pub mod sink;
pub mod worker_status;
