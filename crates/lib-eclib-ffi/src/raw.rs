//! Wire structures of the EClib ABI.
//!
//! Layouts are transcribed from the OEM development package headers
//! (`BLStructs.h`). All enumerated fields are plain `i32` on the wire;
//! decoding to typed values happens in [`crate::device`] and
//! [`crate::data`], never here.

use std::os::raw::c_char;

/// Number of `u32` words in a data buffer returned by `BL_GetData`.
pub const DATA_BUFFER_SIZE: usize = 1000;

/// Size of the label field of a technique parameter.
pub const ECC_PARAM_LABEL_SIZE: usize = 64;

/// `TDeviceInfos_t`, filled in by `BL_Connect`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceInfos {
    pub device_code: i32,
    pub ram_size: i32,
    pub cpu: i32,
    pub number_of_channels: i32,
    pub number_of_slots: i32,
    pub firmware_version: i32,
    pub firmware_date_yyyy: i32,
    pub firmware_date_mm: i32,
    pub firmware_date_dd: i32,
    pub ht_display_on: i32,
    pub nb_of_connected_pc: i32,
}

/// `TChannelInfos_t`, filled in by `BL_GetChannelInfos`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelInfos {
    pub channel: i32,
    pub board_version: i32,
    pub board_serial_number: i32,
    pub firmware_code: i32,
    pub firmware_version: i32,
    pub xilinx_version: i32,
    pub amp_code: i32,
    pub nb_amps: i32,
    pub lc_board: i32,
    pub z_board: i32,
    pub reserved: i32,
    pub reserved2: i32,
    pub mem_size: i32,
    pub mem_filled: i32,
    pub state: i32,
    pub max_i_range: i32,
    pub min_i_range: i32,
    pub max_bandwidth: i32,
    pub nb_of_techniques: i32,
}

/// `TCurrentValues_t`, filled in by `BL_GetCurrentValues` and
/// `BL_GetData`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentValues {
    pub state: i32,
    pub mem_filled: i32,
    pub time_base: f32,
    pub ewe: f32,
    pub ewe_range_min: f32,
    pub ewe_range_max: f32,
    pub ece: f32,
    pub ece_range_min: f32,
    pub ece_range_max: f32,
    pub e_overflow: i32,
    pub i: f32,
    pub i_range: i32,
    pub i_overflow: i32,
    pub elapsed_time: f32,
    pub freq: f32,
    pub r_comp: f32,
    pub saturation: i32,
    pub opt_err: i32,
    pub opt_pos: i32,
}

/// `TDataInfos_t`, the header describing one `BL_GetData` buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DataInfos {
    pub irq_skipped: i32,
    /// Number of rows (points) in the buffer.
    pub nb_rows: i32,
    /// Number of columns (words per point).
    pub nb_cols: i32,
    /// 0-based index of the technique that produced the data (linked
    /// techniques only).
    pub technique_index: i32,
    pub technique_id: i32,
    pub process_index: i32,
    pub loop_count: i32,
    /// Start time of the buffer (s).
    pub start_time: f64,
    pub mux_pad: i32,
}

/// `TDataBuffer_t`, raw acquisition words.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DataBuffer {
    pub data: [u32; DATA_BUFFER_SIZE],
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self {
            data: [0; DATA_BUFFER_SIZE],
        }
    }
}

/// `TEccParam_t`: one technique parameter, filled in by the
/// `BL_Define*Parameter` entry points. The label and value encoding are
/// owned by the vendor; this struct is opaque payload once defined.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EccParam {
    pub label: [c_char; ECC_PARAM_LABEL_SIZE],
    pub param_type: i32,
    pub value: i32,
    pub index: i32,
}

impl Default for EccParam {
    fn default() -> Self {
        Self {
            label: [0; ECC_PARAM_LABEL_SIZE],
            param_type: 0,
            value: 0,
            index: 0,
        }
    }
}

/// `TEccParams_t`, the parameter array header passed to
/// `BL_LoadTechnique`.
///
/// The vendor ABI packs this record to 4 bytes (Delphi layout), so the
/// pointer sits directly after `len` even on 64-bit targets.
#[repr(C, packed(4))]
#[derive(Clone, Copy)]
pub struct EccParams {
    pub len: i32,
    pub params: *mut EccParam,
}

/// `THardwareConf_t`: electrode connection and ground mode.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwareConf {
    pub connection: i32,
    pub ground_mode: i32,
}

/// `TExperimentInfos_t`, experiment metadata stored on a channel.
///
/// Layout per the OEM package documentation: packed time stamps plus the
/// result file name.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ExperimentInfos {
    pub group: i32,
    /// Time of day packed as HHMMSS.
    pub time_hms: i32,
    /// Date packed as YYYYMMDD.
    pub time_ymd: i32,
    pub filename: [c_char; 256],
}

impl Default for ExperimentInfos {
    fn default() -> Self {
        Self {
            group: 0,
            time_hms: 0,
            time_ymd: 0,
            filename: [0; 256],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    // The DLL fills these by address; a silent field slip corrupts every
    // decoded value, so pin the layouts.

    #[test]
    fn device_infos_layout() {
        assert_eq!(size_of::<DeviceInfos>(), 44);
    }

    #[test]
    fn channel_infos_layout() {
        assert_eq!(size_of::<ChannelInfos>(), 76);
    }

    #[test]
    fn current_values_layout() {
        assert_eq!(size_of::<CurrentValues>(), 76);
    }

    #[test]
    fn data_infos_layout() {
        // Seven i32 words, padding to align the f64, then the mux pad.
        assert_eq!(size_of::<DataInfos>(), 48);
        assert_eq!(align_of::<DataInfos>(), 8);
    }

    #[test]
    fn data_buffer_layout() {
        assert_eq!(size_of::<DataBuffer>(), 4000);
    }

    #[test]
    fn ecc_param_layout() {
        assert_eq!(size_of::<EccParam>(), 76);
    }

    #[test]
    fn ecc_params_is_packed() {
        // len + pointer with no padding between them.
        assert_eq!(
            size_of::<EccParams>(),
            4 + size_of::<*mut EccParam>()
        );
    }

    #[test]
    fn hardware_conf_layout() {
        assert_eq!(size_of::<HardwareConf>(), 8);
    }
}
