use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{CHANNELS_PER_HALF, HALVES_PER_ASIC, MAX_BOARDS, V013_PACKET_HEADER_SIZE};
use super::error::ConfigError;

/// Every key understood by Config. Anything else in a YAML file is reported.
const KNOWN_KEYS: [&str; 18] = [
    "data_path",
    "run_number",
    "follow",
    "protocol",
    "detector",
    "num_boards",
    "num_asics",
    "channels_per_asic",
    "expected_samples",
    "machine_gun_max_time",
    "alignment_tolerance",
    "packet_size",
    "board_id_offset",
    "max_in_progress_events",
    "refresh_interval_secs",
    "readout_adc_threshold",
    "poll_interval_ms",
    "max_idle_polls",
];

/// Packet format generation produced by the readout boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Fixed size packets of 36 framed lines with a 16-bit sequence number
    #[default]
    Legacy,
    /// Sync-marker framed packages with a 32-bit packet number
    V013,
}

impl Protocol {
    /// Width of the board timestamp counter. Legacy lines carry a 32-bit counter that wraps
    /// within a run.
    pub fn timestamp_bits(&self) -> u32 {
        match self {
            Self::Legacy => 32,
            Self::V013 => 64,
        }
    }
}

/// The calorimeter the boards are reading out. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    #[default]
    Lfhcal,
    Eeemcal,
    Focal,
}

impl std::fmt::Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lfhcal => write!(f, "LFHCal"),
            Self::Eeemcal => write!(f, "EEEMCal"),
            Self::Focal => write!(f, "FOCAL"),
        }
    }
}

/// Structure representing the monitor configuration. Contains pathing, hardware layout
/// and reconstruction thresholds.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_path: PathBuf,
    pub run_number: i32,
    pub follow: bool,
    pub protocol: Protocol,
    pub detector: Detector,
    pub num_boards: usize,
    pub num_asics: usize,
    pub channels_per_asic: usize,
    pub expected_samples: usize,
    pub machine_gun_max_time: u64,
    pub alignment_tolerance: u64,
    pub packet_size: usize,
    pub board_id_offset: usize,
    pub max_in_progress_events: usize,
    pub refresh_interval_secs: u64,
    pub readout_adc_threshold: u16,
    pub poll_interval_ms: u64,
    pub max_idle_polls: u32,
}

impl Default for Config {
    /// Generate a new Config for the standard four board, two ASIC test beam setup
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            run_number: 0,
            follow: false,
            protocol: Protocol::Legacy,
            detector: Detector::Lfhcal,
            num_boards: 4,
            num_asics: 2,
            channels_per_asic: 72,
            expected_samples: 20,
            machine_gun_max_time: 1000,
            alignment_tolerance: 5,
            packet_size: 1452,
            board_id_offset: 4,
            max_in_progress_events: 4096,
            refresh_interval_secs: 4,
            readout_adc_threshold: 5,
            poll_interval_ms: 1000,
            max_idle_polls: 0,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    ///
    /// Unknown keys are reported as warnings and otherwise ignored; missing keys take
    /// their default value.
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_str)
    }

    /// Parse and validate a configuration from a YAML string
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml_str)?;
        if let serde_yaml::Value::Mapping(map) = &value {
            for key in map.keys() {
                match key.as_str() {
                    Some(k) if KNOWN_KEYS.contains(&k) => (),
                    Some(k) => log::warn!("Unknown configuration key: {k}"),
                    None => log::warn!("Unknown configuration key: {key:?}"),
                }
            }
        }

        let config = serde_yaml::from_value::<Self>(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the hardware layout and thresholds can drive the reconstruction
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_boards == 0 || self.num_boards > MAX_BOARDS {
            return Err(ConfigError::InvalidValue(
                "num_boards",
                format!("{} is not in 1..={MAX_BOARDS}", self.num_boards),
            ));
        }
        if self.num_asics == 0 || self.num_asics > 2 {
            return Err(ConfigError::InvalidValue(
                "num_asics",
                format!("{} is not in 1..=2", self.num_asics),
            ));
        }
        if self.channels_per_asic == 0
            || self.channels_per_asic % CHANNELS_PER_HALF != 0
            || self.channels_per_asic > CHANNELS_PER_HALF * HALVES_PER_ASIC
        {
            return Err(ConfigError::InvalidValue(
                "channels_per_asic",
                format!(
                    "{} must be {CHANNELS_PER_HALF} or {}",
                    self.channels_per_asic,
                    CHANNELS_PER_HALF * HALVES_PER_ASIC
                ),
            ));
        }
        if self.expected_samples == 0 {
            return Err(ConfigError::InvalidValue(
                "expected_samples",
                String::from("must be at least 1"),
            ));
        }
        if self.alignment_tolerance == 0 {
            return Err(ConfigError::InvalidValue(
                "alignment_tolerance",
                String::from("must be at least 1"),
            ));
        }
        if self.packet_size == 0 {
            return Err(ConfigError::InvalidValue(
                "packet_size",
                String::from("must be at least 1"),
            ));
        }
        if self.board_id_offset >= V013_PACKET_HEADER_SIZE {
            return Err(ConfigError::InvalidValue(
                "board_id_offset",
                format!(
                    "{} is outside the {V013_PACKET_HEADER_SIZE} byte packet header",
                    self.board_id_offset
                ),
            ));
        }
        if self.max_in_progress_events == 0 {
            return Err(ConfigError::InvalidValue(
                "max_in_progress_events",
                String::from("must be at least 1"),
            ));
        }
        Ok(())
    }

    /// Get the path to the data file of the configured run
    pub fn get_run_file(&self) -> PathBuf {
        self.data_path.join(self.get_run_str())
    }

    /// Construct the run file name using the test beam DAQ format
    fn get_run_str(&self) -> String {
        format!("Run{:0>3}.h2g", self.run_number)
    }

    /// Total channel slots carried by one board
    pub fn channels_per_board(&self) -> usize {
        self.num_asics * self.channels_per_asic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels_per_board(), 144);
    }

    #[test]
    fn test_yaml_partial_keys_take_defaults() {
        let yaml = "protocol: v013\nnum_boards: 2\nexpected_samples: 10\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.protocol, Protocol::V013);
        assert_eq!(config.num_boards, 2);
        assert_eq!(config.expected_samples, 10);
        assert_eq!(config.machine_gun_max_time, 1000);
        assert_eq!(config.channels_per_asic, 72);
    }

    #[test]
    fn test_unknown_key_is_tolerated() {
        let yaml = "num_boards: 3\nDETECTOR_ID: 1\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.num_boards, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_yaml_str("num_boards: 0\n").is_err());
        assert!(Config::from_yaml_str("channels_per_asic: 50\n").is_err());
        assert!(Config::from_yaml_str("expected_samples: 0\n").is_err());
        assert!(Config::from_yaml_str("board_id_offset: 12\n").is_err());
    }

    #[test]
    fn test_round_trip_template() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.packet_size, config.packet_size);
        assert_eq!(parsed.detector, Detector::Lfhcal);
    }

    #[test]
    fn test_timestamp_width() {
        assert_eq!(Protocol::Legacy.timestamp_bits(), 32);
        assert_eq!(Protocol::V013.timestamp_bits(), 64);
    }

    #[test]
    fn test_run_file() {
        let config = Config {
            data_path: PathBuf::from("/data"),
            run_number: 42,
            ..Default::default()
        };
        assert_eq!(config.get_run_file(), PathBuf::from("/data/Run042.h2g"));
    }
}
