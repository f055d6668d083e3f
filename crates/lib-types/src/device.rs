//! Device identification and metadata.
//!
//! Device codes follow the numbering of the EC-Lab OEM package; the raw
//! values come back from the instrument in `BL_Connect` and must round-trip
//! unchanged.

use serde::{Deserialize, Serialize};

/// Instrument model reported at connection time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCode {
    Vmp,
    Vmp2,
    Mpg,
    Bistat,
    Mcs200,
    Vmp3,
    Vsp,
    Hcp803,
    Epp400,
    Epp4000,
    Bistat2,
    Fct150s,
    Vmp300,
    Sp50,
    Sp150,
    Fct50s,
    Sp300,
    Clb500,
    Hcp1005,
    Clb2000,
    Vsp300,
    Sp200,
    Mpg2,
    Sp100,
    Mosled,
    Kinexxx,
    Nikita,
    Sp240,
    Mpg205,
    Mpg210,
    Mpg220,
    Mpg240,
    /// Code not known to this library version.
    Unknown(i32),
}

impl DeviceCode {
    /// Decode the raw `DeviceCode` field of the connection info structure.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Vmp,
            1 => Self::Vmp2,
            2 => Self::Mpg,
            3 => Self::Bistat,
            4 => Self::Mcs200,
            5 => Self::Vmp3,
            6 => Self::Vsp,
            7 => Self::Hcp803,
            8 => Self::Epp400,
            9 => Self::Epp4000,
            10 => Self::Bistat2,
            11 => Self::Fct150s,
            12 => Self::Vmp300,
            13 => Self::Sp50,
            14 => Self::Sp150,
            15 => Self::Fct50s,
            16 => Self::Sp300,
            17 => Self::Clb500,
            18 => Self::Hcp1005,
            19 => Self::Clb2000,
            20 => Self::Vsp300,
            21 => Self::Sp200,
            22 => Self::Mpg2,
            23 => Self::Sp100,
            24 => Self::Mosled,
            25 => Self::Kinexxx,
            26 => Self::Nikita,
            27 => Self::Sp240,
            28 => Self::Mpg205,
            29 => Self::Mpg210,
            30 => Self::Mpg220,
            31 => Self::Mpg240,
            other => Self::Unknown(other),
        }
    }

    /// Marketing name, as printed by the vendor tools.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vmp => "VMP",
            Self::Vmp2 => "VMP2",
            Self::Mpg => "MPG",
            Self::Bistat => "BISTAT",
            Self::Mcs200 => "MCS-200",
            Self::Vmp3 => "VMP3",
            Self::Vsp => "VSP",
            Self::Hcp803 => "HCP-803",
            Self::Epp400 => "EPP-400",
            Self::Epp4000 => "EPP-4000",
            Self::Bistat2 => "BISTAT 2",
            Self::Fct150s => "FCT-150S",
            Self::Vmp300 => "VMP-300",
            Self::Sp50 => "SP-50",
            Self::Sp150 => "SP-150",
            Self::Fct50s => "FCT-50S",
            Self::Sp300 => "SP-300",
            Self::Clb500 => "CLB-500",
            Self::Hcp1005 => "HCP-1005",
            Self::Clb2000 => "CLB-2000",
            Self::Vsp300 => "VSP-300",
            Self::Sp200 => "SP-200",
            Self::Mpg2 => "MPG2",
            Self::Sp100 => "SP-100",
            Self::Mosled => "MOSLED",
            Self::Kinexxx => "KINEXXX",
            Self::Nikita => "NIKITA",
            Self::Sp240 => "SP-240",
            Self::Mpg205 => "MPG-205",
            Self::Mpg210 => "MPG-210",
            Self::Mpg220 => "MPG-220",
            Self::Mpg240 => "MPG-240",
            Self::Unknown(_) => "unknown device",
        }
    }

    /// Whether this instrument belongs to the SP-300/VMP-300 (VMP4) series.
    ///
    /// The series determines which technique binaries (`.ecc` vs `4.ecc`)
    /// must be loaded and how some ranges are interpreted.
    pub fn is_vmp4_series(&self) -> bool {
        matches!(
            self,
            Self::Sp200 | Self::Sp300 | Self::Vsp300 | Self::Vmp300 | Self::Sp240
        )
    }

    /// Whether this instrument belongs to the VMP3 series.
    pub fn is_vmp3_series(&self) -> bool {
        matches!(
            self,
            Self::Vmp2
                | Self::Vmp3
                | Self::Bistat
                | Self::Bistat2
                | Self::Mcs200
                | Self::Vsp
                | Self::Hcp803
                | Self::Hcp1005
                | Self::Epp400
                | Self::Epp4000
                | Self::Fct50s
                | Self::Fct150s
                | Self::Clb500
                | Self::Clb2000
                | Self::Sp50
                | Self::Sp100
                | Self::Sp150
                | Self::Mpg2
                | Self::Mpg205
                | Self::Mpg210
                | Self::Mpg220
                | Self::Mpg240
        )
    }
}

impl std::fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown device (code {code})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Firmware currently loaded on a channel board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareCode {
    /// No firmware loaded.
    None,
    /// Firmware for the EC-Lab application; must be replaced with the
    /// kernel firmware before the OEM library can run techniques.
    Interpreter,
    /// Unidentified firmware.
    Unknown,
    /// Kernel firmware for the OEM library.
    Kernel,
    /// Invalid firmware image.
    Invalid,
    /// Calibration firmware.
    Ecal,
    /// Code not known to this library version.
    Other(i32),
}

impl FirmwareCode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Interpreter,
            4 => Self::Unknown,
            5 => Self::Kernel,
            8 => Self::Invalid,
            10 => Self::Ecal,
            other => Self::Other(other),
        }
    }

    /// True when techniques can be loaded and started on the channel.
    pub fn is_kernel(&self) -> bool {
        matches!(self, Self::Kernel)
    }
}

/// Device metadata returned by a successful connection.
///
/// Decoded copy of the vendor's `TDeviceInfos_t`; all fields are plain
/// integers on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_code: DeviceCode,
    /// Embedded RAM size (MB).
    pub ram_size: i32,
    pub cpu: i32,
    pub number_of_channels: i32,
    pub number_of_slots: i32,
    pub firmware_version: i32,
    pub firmware_date_yyyy: i32,
    pub firmware_date_mm: i32,
    pub firmware_date_dd: i32,
    pub ht_display_on: i32,
    pub connected_pc_count: i32,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} channel(s), firmware {} of {:04}-{:02}-{:02})",
            self.device_code,
            self.number_of_channels,
            self.firmware_version,
            self.firmware_date_yyyy,
            self.firmware_date_mm,
            self.firmware_date_dd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_code_round_trip() {
        assert_eq!(DeviceCode::from_raw(14), DeviceCode::Sp150);
        assert_eq!(DeviceCode::from_raw(18), DeviceCode::Hcp1005);
        assert_eq!(DeviceCode::from_raw(255), DeviceCode::Unknown(255));
    }

    #[test]
    fn vmp4_family() {
        assert!(DeviceCode::Sp300.is_vmp4_series());
        assert!(DeviceCode::Vsp300.is_vmp4_series());
        assert!(!DeviceCode::Sp150.is_vmp4_series());
        assert!(DeviceCode::Sp150.is_vmp3_series());
    }

    #[test]
    fn kernel_firmware_detection() {
        assert!(FirmwareCode::from_raw(5).is_kernel());
        assert!(!FirmwareCode::from_raw(1).is_kernel());
        assert_eq!(FirmwareCode::from_raw(7), FirmwareCode::Other(7));
    }
}
