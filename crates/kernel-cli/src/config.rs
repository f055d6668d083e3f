//! Experiment configuration loading and validation.

use anyhow::{Context, Result};
use lib_types::{TechParam, TechniqueId, VoltageRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level experiment configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name/description.
    pub name: String,

    /// Path to the EClib shared library. When absent, the platform's
    /// conventional file name is loaded from the search path.
    pub library: Option<PathBuf>,

    /// Instrument connection.
    pub device: DeviceConfig,

    /// Technique to run.
    pub technique: TechniqueConfig,

    /// Polling intervals.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Instrument connection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// IP address or USB designator (e.g. `"USB0"`).
    pub address: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u8,

    /// Channel to run the experiment on (0-based).
    #[serde(default)]
    pub channel: u8,

    /// Load kernel firmware automatically when the channel does not have
    /// it yet.
    #[serde(default = "default_true")]
    pub load_firmware: bool,
}

fn default_timeout_s() -> u8 {
    5
}

/// Potential range selection for technique parameters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ERange {
    V2_5,
    V5,
    V10,
    #[default]
    Auto,
}

impl From<ERange> for VoltageRange {
    fn from(range: ERange) -> Self {
        match range {
            ERange::V2_5 => VoltageRange::V2_5,
            ERange::V5 => VoltageRange::V5,
            ERange::V10 => VoltageRange::V10,
            ERange::Auto => VoltageRange::Auto,
        }
    }
}

/// One constant-current step of a CP sequence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CpStep {
    /// Step current (A).
    pub current_a: f32,

    /// Step duration (s).
    pub duration_s: f32,
}

/// Technique selection with its parameters.
///
/// Parameter labels match the vendor's technique documentation; the
/// builders below translate the configuration into the label/value pairs
/// the `.ecc` binaries expect.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TechniqueConfig {
    /// Open circuit voltage (rest).
    Ocv {
        /// Rest duration (s).
        rest_time_s: f32,

        /// Record a point every this many seconds.
        #[serde(default = "default_record_dt")]
        record_every_dt: f32,

        /// Record a point on a potential change of this many volts.
        #[serde(default = "default_record_de")]
        record_every_de: f32,

        #[serde(default)]
        e_range: ERange,
    },

    /// Chrono-potentiometry: a sequence of constant-current steps.
    Cp {
        steps: Vec<CpStep>,

        #[serde(default = "default_record_dt")]
        record_every_dt: f32,

        #[serde(default = "default_record_de")]
        record_every_de: f32,

        /// Number of times the step sequence repeats.
        #[serde(default)]
        n_cycles: i32,
    },
}

fn default_record_dt() -> f32 {
    0.1
}

fn default_record_de() -> f32 {
    0.01
}

impl TechniqueConfig {
    pub fn technique_id(&self) -> TechniqueId {
        match self {
            Self::Ocv { .. } => TechniqueId::Ocv,
            Self::Cp { .. } => TechniqueId::Cp,
        }
    }

    /// Technique binary file name for the instrument series.
    pub fn ecc_file(&self, vmp4: bool) -> String {
        let stem = match self {
            Self::Ocv { .. } => "ocv",
            Self::Cp { .. } => "cp",
        };
        if vmp4 {
            format!("{stem}4.ecc")
        } else {
            format!("{stem}.ecc")
        }
    }

    /// Build the parameter list for `BL_LoadTechnique`.
    pub fn tech_params(&self) -> Vec<TechParam> {
        match self {
            Self::Ocv {
                rest_time_s,
                record_every_dt,
                record_every_de,
                e_range,
            } => vec![
                TechParam::new("Rest_time_T", *rest_time_s),
                TechParam::new("Record_every_dE", *record_every_de),
                TechParam::new("Record_every_dT", *record_every_dt),
                TechParam::new("E_Range", VoltageRange::from(*e_range).to_raw()),
            ],
            Self::Cp {
                steps,
                record_every_dt,
                record_every_de,
                n_cycles,
            } => {
                let mut params = Vec::with_capacity(3 * steps.len() + 4);
                for (index, step) in steps.iter().enumerate() {
                    let index = index as i32;
                    params.push(TechParam::with_index("Current_step", step.current_a, index));
                    params.push(TechParam::with_index("vs_initial", false, index));
                    params.push(TechParam::with_index("Duration_step", step.duration_s, index));
                }
                params.push(TechParam::new("Step_number", steps.len() as i32 - 1));
                params.push(TechParam::new("Record_every_dT", *record_every_dt));
                params.push(TechParam::new("Record_every_dE", *record_every_de));
                params.push(TechParam::new("N_Cycles", *n_cycles));
                params
            }
        }
    }
}

/// Polling intervals for the background threads.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between `BL_GetData` calls (ms).
    #[serde(default = "default_data_interval")]
    pub data_interval_ms: u64,

    /// Interval between `BL_GetMessage` calls (ms).
    #[serde(default = "default_message_interval")]
    pub message_interval_ms: u64,

    /// Hard cap on the experiment duration (s); 0 disables the cap.
    #[serde(default)]
    pub max_duration_s: u64,
}

fn default_data_interval() -> u64 {
    1000
}

fn default_message_interval() -> u64 {
    500
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            data_interval_ms: default_data_interval(),
            message_interval_ms: default_message_interval(),
            max_duration_s: 0,
        }
    }
}

/// Output configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write decoded data points.
    #[serde(default = "default_true")]
    pub points: bool,

    /// Write firmware messages.
    #[serde(default = "default_true")]
    pub messages: bool,
}

fn default_true() -> bool {
    true
}

/// Load configuration from a TOML or JSON file.
pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: ExperimentConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)?
    } else {
        // Assume TOML
        toml::from_str(&content).with_context(|| "Failed to parse config as TOML")?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
pub fn validate_config(config: &ExperimentConfig) -> Result<()> {
    if config.device.address.is_empty() {
        anyhow::bail!("Device address must not be empty");
    }

    if let Some(ref library) = config.library {
        if !library.exists() {
            anyhow::bail!("EClib library not found: {:?}", library);
        }
    }

    match &config.technique {
        TechniqueConfig::Ocv { rest_time_s, .. } => {
            if *rest_time_s <= 0.0 {
                anyhow::bail!("OCV rest_time_s must be positive (got {})", rest_time_s);
            }
        }
        TechniqueConfig::Cp {
            steps, n_cycles, ..
        } => {
            if steps.is_empty() {
                anyhow::bail!("CP requires at least one current step");
            }
            if steps.iter().any(|s| s.duration_s <= 0.0) {
                anyhow::bail!("CP step durations must be positive");
            }
            if *n_cycles < 0 {
                anyhow::bail!("n_cycles must be non-negative (got {})", n_cycles);
            }
        }
    }

    if config.polling.data_interval_ms == 0 {
        anyhow::bail!("data_interval_ms must be positive");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ParamValue;

    fn ocv_config() -> ExperimentConfig {
        toml::from_str(
            r#"
            name = "ocv smoke"

            [device]
            address = "USB0"

            [technique]
            kind = "ocv"
            rest_time_s = 10.0
            "#,
        )
        .unwrap()
    }

    #[test]
    fn ocv_config_parses_with_defaults() {
        let config = ocv_config();
        assert_eq!(config.device.timeout_s, 5);
        assert_eq!(config.device.channel, 0);
        assert!(config.device.load_firmware);
        assert_eq!(config.polling.data_interval_ms, 1000);
        validate_config(&config).unwrap();
    }

    #[test]
    fn ocv_params_follow_vendor_labels() {
        let config = ocv_config();
        let params = config.technique.tech_params();
        let labels: Vec<&str> = params.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Rest_time_T", "Record_every_dE", "Record_every_dT", "E_Range"]
        );
        assert_eq!(params[0].value, ParamValue::Single(10.0));
        // E_Range defaults to auto.
        assert_eq!(params[3].value, ParamValue::Int(3));
    }

    #[test]
    fn cp_params_index_each_step() {
        let config: ExperimentConfig = toml::from_str(
            r#"
            name = "cp"

            [device]
            address = "192.168.0.1"
            channel = 2

            [technique]
            kind = "cp"
            n_cycles = 1
            steps = [
                { current_a = 0.001, duration_s = 2.0 },
                { current_a = -0.001, duration_s = 2.0 },
            ]
            "#,
        )
        .unwrap();
        validate_config(&config).unwrap();

        let params = config.technique.tech_params();
        assert_eq!(params[0].label, "Current_step");
        assert_eq!(params[0].index, 0);
        assert_eq!(params[3].index, 1);
        let step_number = params
            .iter()
            .find(|p| p.label == "Step_number")
            .unwrap();
        assert_eq!(step_number.value, ParamValue::Int(1));
    }

    #[test]
    fn ecc_file_tracks_instrument_series() {
        let config = ocv_config();
        assert_eq!(config.technique.ecc_file(false), "ocv.ecc");
        assert_eq!(config.technique.ecc_file(true), "ocv4.ecc");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = ocv_config();
        config.device.address.clear();
        assert!(validate_config(&config).is_err());

        let config: ExperimentConfig = toml::from_str(
            r#"
            name = "bad"

            [device]
            address = "USB0"

            [technique]
            kind = "cp"
            steps = []
            "#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn json_config_parses() {
        let json = serde_json::json!({
            "name": "json smoke",
            "device": { "address": "USB0" },
            "technique": { "kind": "ocv", "rest_time_s": 1.0 }
        });
        let config: ExperimentConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.name, "json smoke");
    }
}
