//! Technique identifiers and technique parameter values.
//!
//! A technique is a measurement program (`.ecc` binary) loaded onto a
//! channel; its identifier comes back in every data-buffer header and
//! selects the column layout of the raw data.

use serde::{Deserialize, Serialize};

/// Identifier of the technique that produced a data buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechniqueId {
    /// No data available yet.
    None,
    /// Open Circuit Voltage (rest).
    Ocv,
    /// Chrono-amperometry.
    Ca,
    /// Chrono-potentiometry.
    Cp,
    /// Cyclic voltammetry.
    Cv,
    /// Potentio electrochemical impedance spectroscopy.
    Peis,
    /// Galvano electrochemical impedance spectroscopy.
    Geis,
    /// Staircase potentio EIS.
    Speis,
    /// Staircase galvano EIS.
    Sgeis,
    /// Constant power.
    CPower,
    /// Constant load.
    CLoad,
    /// Potentio dynamic.
    Pdyn,
    /// Galvano dynamic.
    Gdyn,
    /// Cyclic voltammetry advanced.
    Cva,
    /// Differential pulse voltammetry.
    Dpv,
    /// Square wave voltammetry.
    Swv,
    /// Normal pulse voltammetry.
    Npv,
    /// Linear polarization.
    Lp,
    /// Zero resistance ammeter.
    Zra,
    /// Loop marker for linked techniques.
    Loop,
    /// Trigger out.
    TriggerOut,
    /// Trigger in.
    TriggerIn,
    /// Chrono-potentiometry with limits.
    CpLimit,
    /// Chrono-amperometry with limits.
    CaLimit,
    /// Galvano dynamic with limits.
    GdynLimit,
    /// Potentio dynamic with limits.
    PdynLimit,
    /// Modular pulse.
    Mp,
    Unknown(i32),
}

impl TechniqueId {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            100 => Self::Ocv,
            101 => Self::Ca,
            102 => Self::Cp,
            103 => Self::Cv,
            104 => Self::Peis,
            107 => Self::Geis,
            110 => Self::CPower,
            111 => Self::CLoad,
            113 => Self::Speis,
            114 => Self::Sgeis,
            124 => Self::Pdyn,
            125 => Self::Gdyn,
            126 => Self::Cva,
            127 => Self::Dpv,
            128 => Self::Swv,
            129 => Self::Npv,
            134 => Self::Lp,
            139 => Self::Zra,
            150 => Self::Loop,
            151 => Self::TriggerOut,
            152 => Self::TriggerIn,
            155 => Self::CpLimit,
            156 => Self::GdynLimit,
            157 => Self::CaLimit,
            158 => Self::PdynLimit,
            167 => Self::Mp,
            other => Self::Unknown(other),
        }
    }

    /// Default technique binary, VMP3 series naming. The VMP4 series uses
    /// the same stem with a `4` suffix (`ocv4.ecc`).
    pub fn ecc_file(&self) -> Option<&'static str> {
        match self {
            Self::Ocv => Some("ocv.ecc"),
            Self::Ca => Some("ca.ecc"),
            Self::Cp => Some("cp.ecc"),
            Self::Cv => Some("cv.ecc"),
            Self::Peis => Some("peis.ecc"),
            Self::Geis => Some("geis.ecc"),
            Self::CpLimit => Some("cplimit.ecc"),
            Self::CaLimit => Some("calimit.ecc"),
            _ => None,
        }
    }
}

impl std::fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown technique ({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A typed technique parameter value.
///
/// The vendor API only knows three parameter types (`BL_DefineIntParameter`,
/// `BL_DefineSglParameter`, `BL_DefineBoolParameter`); everything an
/// experiment configures maps onto one of these.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Single(f32),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Single(v)
    }
}

/// A named technique parameter with an optional step index.
///
/// Multi-step techniques (e.g. chrono-potentiometry sequences) repeat the
/// same label with increasing indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TechParam {
    pub label: String,
    pub value: ParamValue,
    #[serde(default)]
    pub index: i32,
}

impl TechParam {
    pub fn new(label: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            index: 0,
        }
    }

    pub fn with_index(label: impl Into<String>, value: impl Into<ParamValue>, index: i32) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technique_id_round_trip() {
        assert_eq!(TechniqueId::from_raw(100), TechniqueId::Ocv);
        assert_eq!(TechniqueId::from_raw(155), TechniqueId::CpLimit);
        assert_eq!(TechniqueId::from_raw(42), TechniqueId::Unknown(42));
    }

    #[test]
    fn ecc_files_for_runnable_techniques() {
        assert_eq!(TechniqueId::Ocv.ecc_file(), Some("ocv.ecc"));
        assert_eq!(TechniqueId::Loop.ecc_file(), None);
    }

    #[test]
    fn param_value_conversions() {
        assert_eq!(ParamValue::from(true), ParamValue::Bool(true));
        assert_eq!(ParamValue::from(10), ParamValue::Int(10));
        assert_eq!(ParamValue::from(0.1f32), ParamValue::Single(0.1));
    }
}
