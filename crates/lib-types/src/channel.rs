//! Channel state, measurement ranges and per-channel board information.

use crate::device::FirmwareCode;
use serde::{Deserialize, Serialize};

/// Run state of a measurement channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Stop,
    Run,
    Pause,
    Unknown(i32),
}

impl ChannelState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Stop,
            1 => Self::Run,
            2 => Self::Pause,
            other => Self::Unknown(other),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Run)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Run => f.write_str("run"),
            Self::Pause => f.write_str("pause"),
            Self::Unknown(code) => write!(f, "unknown state ({code})"),
        }
    }
}

/// Current (intensity) range.
///
/// The discriminants match the vendor constants; `label` is the value as
/// shown in the EC-Lab user interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentRange {
    I100pA,
    I1nA,
    I10nA,
    I100nA,
    I1uA,
    I10uA,
    I100uA,
    I1mA,
    I10mA,
    I100mA,
    I1A,
    Booster,
    Auto,
    /// 100 pA range with x10 current gain.
    I10pA,
    /// 100 pA range with x100 current gain.
    I1pA,
    Unknown(i32),
}

impl CurrentRange {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::I100pA,
            1 => Self::I1nA,
            2 => Self::I10nA,
            3 => Self::I100nA,
            4 => Self::I1uA,
            5 => Self::I10uA,
            6 => Self::I100uA,
            7 => Self::I1mA,
            8 => Self::I10mA,
            9 => Self::I100mA,
            10 => Self::I1A,
            11 => Self::Booster,
            12 => Self::Auto,
            13 => Self::I10pA,
            14 => Self::I1pA,
            other => Self::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::I100pA => "100 pA",
            Self::I1nA => "1 nA",
            Self::I10nA => "10 nA",
            Self::I100nA => "100 nA",
            Self::I1uA => "1 uA",
            Self::I10uA => "10 uA",
            Self::I100uA => "100 uA",
            Self::I1mA => "1 mA",
            Self::I10mA => "10 mA",
            Self::I100mA => "100 mA",
            Self::I1A => "1 A",
            Self::Booster => "booster",
            Self::Auto => "auto",
            Self::I10pA => "10 pA",
            Self::I1pA => "1 pA",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Potential range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoltageRange {
    /// ±2.5 V
    V2_5,
    /// ±5 V
    V5,
    /// ±10 V
    V10,
    Auto,
    Unknown(i32),
}

impl VoltageRange {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::V2_5,
            1 => Self::V5,
            2 => Self::V10,
            3 => Self::Auto,
            other => Self::Unknown(other),
        }
    }

    /// Raw constant for technique parameter encoding (`E_Range`).
    pub fn to_raw(self) -> i32 {
        match self {
            Self::V2_5 => 0,
            Self::V5 => 1,
            Self::V10 => 2,
            Self::Auto => 3,
            Self::Unknown(code) => code,
        }
    }
}

/// Analog bandwidth setting (1..=9; 8 and 9 only on the SP-300 series).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth(pub i32);

impl Bandwidth {
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }
}

/// Cell connection mode of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectrodeConnection {
    Standard,
    CeToGround,
    WeToGround,
    HighVoltage,
    Unknown(i32),
}

impl ElectrodeConnection {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Standard,
            1 => Self::CeToGround,
            2 => Self::WeToGround,
            3 => Self::HighVoltage,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Standard => 0,
            Self::CeToGround => 1,
            Self::WeToGround => 2,
            Self::HighVoltage => 3,
            Self::Unknown(code) => code,
        }
    }
}

/// Ground reference mode of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectrodeMode {
    Grounded,
    Floating,
    Unknown(i32),
}

impl ElectrodeMode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Grounded,
            1 => Self::Floating,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Grounded => 0,
            Self::Floating => 1,
            Self::Unknown(code) => code,
        }
    }
}

/// Hardware configuration of a channel (connection + ground mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub connection: ElectrodeConnection,
    pub mode: ElectrodeMode,
}

/// Per-channel board information, decoded from `TChannelInfos_t`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel: i32,
    pub board_version: i32,
    pub board_serial_number: i32,
    pub firmware_code: FirmwareCode,
    pub firmware_version: i32,
    pub xilinx_version: i32,
    pub amplifier_code: i32,
    pub amplifier_count: i32,
    pub lc_board: i32,
    pub z_board: i32,
    /// Board memory size in bytes.
    pub mem_size: i32,
    /// Board memory currently used in bytes.
    pub mem_filled: i32,
    pub state: ChannelState,
    pub max_current_range: CurrentRange,
    pub min_current_range: CurrentRange,
    pub max_bandwidth: Bandwidth,
    /// Number of techniques currently loaded on the channel.
    pub loaded_techniques: i32,
}

impl ChannelInfo {
    /// Techniques can only run once the kernel firmware is present.
    pub fn is_kernel_loaded(&self) -> bool {
        self.firmware_code.is_kernel()
    }
}

/// Instantaneous measurement snapshot, decoded from `TCurrentValues_t`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentValues {
    pub state: ChannelState,
    pub mem_filled: i32,
    /// Channel time base in seconds; scales the raw timestamps in data
    /// buffers.
    pub time_base: f32,
    /// Working electrode potential (V).
    pub ewe: f32,
    pub ewe_range_min: f32,
    pub ewe_range_max: f32,
    /// Counter electrode potential (V).
    pub ece: f32,
    pub ece_range_min: f32,
    pub ece_range_max: f32,
    pub e_overflow: i32,
    /// Current (A).
    pub current: f32,
    pub current_range: CurrentRange,
    pub i_overflow: i32,
    /// Elapsed time since the technique started (s).
    pub elapsed_time: f32,
    /// Frequency (Hz), impedance techniques only.
    pub frequency: f32,
    /// Compensated resistance (Ohm).
    pub r_comp: f32,
    pub saturation: i32,
    pub opt_error: i32,
    pub opt_position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_state_decoding() {
        assert_eq!(ChannelState::from_raw(0), ChannelState::Stop);
        assert!(ChannelState::from_raw(1).is_running());
        assert_eq!(ChannelState::from_raw(9), ChannelState::Unknown(9));
    }

    #[test]
    fn current_range_labels() {
        assert_eq!(CurrentRange::from_raw(7), CurrentRange::I1mA);
        assert_eq!(CurrentRange::from_raw(7).label(), "1 mA");
        assert_eq!(CurrentRange::from_raw(12), CurrentRange::Auto);
    }

    #[test]
    fn voltage_range_encoding() {
        assert_eq!(VoltageRange::V10.to_raw(), 2);
        assert_eq!(VoltageRange::from_raw(2), VoltageRange::V10);
    }
}
