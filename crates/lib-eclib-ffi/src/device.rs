//! Safe wrapper around a connected instrument.
//!
//! [`EclDevice`] pairs a connection identifier with the library handle it
//! was opened through, so an entry point can never be invoked after its
//! library has been torn down. Raw wire structures stay inside this
//! module; callers see the decoded types from `lib-types`.

use crate::data::{decode_buffer, ChannelData};
use crate::error::{EclError, EclResult};
use crate::loader::{read_c_buffer, EclLibrary};
use crate::params::EccParamSet;
use crate::raw::{
    ChannelInfos, CurrentValues as RawCurrentValues, DataBuffer, DataInfos, DeviceInfos,
    ExperimentInfos, HardwareConf,
};
use lib_types::{
    Bandwidth, ChannelInfo, ChannelState, CurrentRange, CurrentValues, DeviceCode, DeviceInfo,
    ElectrodeConnection, ElectrodeMode, FirmwareCode, HardwareConfig, TechParam,
};
use std::ffi::CString;
use std::os::raw::{c_char, c_uint, c_void};
use std::sync::Arc;

/// Experiment metadata stored on a channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExperimentInfo {
    pub group: i32,
    /// Time of day packed as HHMMSS.
    pub time_hms: i32,
    /// Date packed as YYYYMMDD.
    pub time_ymd: i32,
    pub filename: String,
}

/// A connected potentiostat.
///
/// Dropping a device disconnects it; explicit [`disconnect`] reports the
/// vendor status instead of swallowing it.
///
/// [`disconnect`]: EclDevice::disconnect
pub struct EclDevice {
    library: Arc<EclLibrary>,
    id: i32,
    address: String,
    info: DeviceInfo,
    connected: bool,
}

impl EclDevice {
    /// Connect to the instrument at `address` (an IP address or USB
    /// designator such as `"USB0"`).
    pub fn connect(
        library: &Arc<EclLibrary>,
        address: &str,
        timeout_s: u8,
    ) -> EclResult<Self> {
        let c_address = CString::new(address).map_err(|_| EclError::InvalidParameter {
            name: "address".to_owned(),
            reason: "address contains an interior NUL byte".to_owned(),
        })?;
        let mut id = 0;
        let mut raw = DeviceInfos::default();
        let status = unsafe {
            (library.table().connect)(c_address.as_ptr(), timeout_s, &mut id, &mut raw)
        };
        EclError::check("BL_Connect", status)?;
        let info = decode_device_info(&raw);
        tracing::info!(address, id, device = %info.device_code, "Connected to instrument");
        Ok(Self {
            library: Arc::clone(library),
            id,
            address: address.to_owned(),
            info,
            connected: true,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Metadata reported at connection time.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Whether the instrument belongs to the SP-300/VMP-300 series, which
    /// uses the `4.ecc` technique binaries and a different OCV layout.
    pub fn is_vmp4_series(&self) -> bool {
        self.info.device_code.is_vmp4_series()
    }

    /// Close the connection, reporting the vendor status.
    pub fn disconnect(mut self) -> EclResult<()> {
        self.connected = false;
        let status = unsafe { (self.library.table().disconnect)(self.id) };
        EclError::check("BL_Disconnect", status)
    }

    /// Verify that the instrument still answers.
    pub fn test_connection(&self) -> EclResult<()> {
        let status = unsafe { (self.library.table().test_connection)(self.id) };
        EclError::check("BL_TestConnection", status)
    }

    /// Round-trip times to the communication receiver and the channel
    /// kernel, in milliseconds.
    pub fn test_comm_speed(&self, channel: u8) -> EclResult<(i32, i32)> {
        let mut rcvt = 0;
        let mut kernel = 0;
        let status = unsafe {
            (self.library.table().test_comm_speed)(self.id, channel, &mut rcvt, &mut kernel)
        };
        EclError::check("BL_TestCommSpeed", status)?;
        Ok((rcvt, kernel))
    }

    pub fn is_channel_plugged(&self, channel: u8) -> bool {
        unsafe { (self.library.table().is_channel_plugged)(self.id, channel) }
    }

    /// Channel numbers with a board present.
    pub fn plugged_channels(&self) -> EclResult<Vec<u8>> {
        let size = self.info.number_of_channels.max(1) as usize;
        let mut plugged = vec![0u8; size];
        let status = unsafe {
            (self.library.table().get_channels_plugged)(
                self.id,
                plugged.as_mut_ptr(),
                plugged.len() as u8,
            )
        };
        EclError::check("BL_GetChannelsPlugged", status)?;
        Ok(plugged
            .iter()
            .enumerate()
            .filter(|(_, &present)| present != 0)
            .map(|(ch, _)| ch as u8)
            .collect())
    }

    /// Board information for one channel.
    pub fn channel_info(&self, channel: u8) -> EclResult<ChannelInfo> {
        let mut raw = ChannelInfos::default();
        let status =
            unsafe { (self.library.table().get_channel_infos)(self.id, channel, &mut raw) };
        EclError::check("BL_GetChannelInfos", status)?;
        Ok(decode_channel_info(&raw))
    }

    /// Pending firmware message text for a channel; empty when the
    /// channel has nothing to say.
    pub fn get_message(&self, channel: u8) -> EclResult<String> {
        let mut buf = [0u8; 4096];
        let mut size = buf.len() as c_uint;
        let status = unsafe {
            (self.library.table().get_message)(
                self.id,
                channel,
                buf.as_mut_ptr() as *mut c_char,
                &mut size,
            )
        };
        EclError::check("BL_GetMessage", status)?;
        if size == 0 {
            return Ok(String::new());
        }
        read_c_buffer(&buf, "BL_GetMessage")
    }

    pub fn hardware_config(&self, channel: u8) -> EclResult<HardwareConfig> {
        let mut raw = HardwareConf::default();
        let status = unsafe { (self.library.table().get_hard_conf)(self.id, channel, &mut raw) };
        EclError::check("BL_GetHardConf", status)?;
        Ok(HardwareConfig {
            connection: ElectrodeConnection::from_raw(raw.connection),
            mode: ElectrodeMode::from_raw(raw.ground_mode),
        })
    }

    pub fn set_hardware_config(&self, channel: u8, config: HardwareConfig) -> EclResult<()> {
        let raw = HardwareConf {
            connection: config.connection.to_raw(),
            ground_mode: config.mode.to_raw(),
        };
        let status = unsafe { (self.library.table().set_hard_conf)(self.id, channel, raw) };
        EclError::check("BL_SetHardConf", status)
    }

    /// Load firmware onto the given channels.
    ///
    /// With `files` set to `None` the library picks the kernel firmware
    /// bundled with it. Returns the per-channel results array; individual
    /// channels may fail even when the call as a whole succeeds.
    pub fn load_firmware(
        &self,
        channels: &[u8],
        force_reload: bool,
        files: Option<(&str, &str)>,
    ) -> EclResult<Vec<i32>> {
        let (bin, xlx) = match files {
            Some((bin, xlx)) => (
                Some(to_cstring("bin_file", bin)?),
                Some(to_cstring("xlx_file", xlx)?),
            ),
            None => (None, None),
        };
        let mut results = vec![0; channels.len()];
        let status = unsafe {
            (self.library.table().load_firmware)(
                self.id,
                channels.as_ptr(),
                results.as_mut_ptr(),
                channels.len() as u8,
                false,
                force_reload,
                bin.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
                xlx.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            )
        };
        EclError::check("BL_LoadFirmware", status)?;
        Ok(results)
    }

    /// Rewrite the instrument's flash memory from an OEM image.
    pub fn load_flash(&self, image_path: &str) -> EclResult<()> {
        let path = to_cstring("image_path", image_path)?;
        let status = unsafe { (self.library.table().load_flash)(self.id, path.as_ptr(), false) };
        EclError::check("BL_LoadFlash", status)
    }

    /// Load a technique binary and its parameters onto a channel.
    ///
    /// `first` and `last` position the technique inside a linked
    /// sequence; a standalone technique is both.
    pub fn load_technique(
        &self,
        channel: u8,
        ecc_file: &str,
        params: &[TechParam],
        first: bool,
        last: bool,
    ) -> EclResult<()> {
        let file = to_cstring("ecc_file", ecc_file)?;
        let mut set = EccParamSet::define(&self.library, params)?;
        let status = unsafe {
            (self.library.table().load_technique)(
                self.id,
                channel,
                file.as_ptr(),
                set.as_raw(),
                first,
                last,
                false,
            )
        };
        EclError::check("BL_LoadTechnique", status)?;
        tracing::debug!(channel, ecc_file, params = params.len(), "Loaded technique");
        Ok(())
    }

    /// Replace the parameters of a loaded technique while it runs.
    pub fn update_parameters(
        &self,
        channel: u8,
        technique_index: i32,
        params: &[TechParam],
        ecc_file: &str,
    ) -> EclResult<()> {
        let file = to_cstring("ecc_file", ecc_file)?;
        let mut set = EccParamSet::define(&self.library, params)?;
        let status = unsafe {
            (self.library.table().update_parameters)(
                self.id,
                channel,
                technique_index,
                set.as_raw(),
                file.as_ptr(),
            )
        };
        EclError::check("BL_UpdateParameters", status)
    }

    pub fn start_channel(&self, channel: u8) -> EclResult<()> {
        let status = unsafe { (self.library.table().start_channel)(self.id, channel) };
        EclError::check("BL_StartChannel", status)
    }

    /// Start several channels at once; returns the per-channel results.
    pub fn start_channels(&self, channels: &[u8]) -> EclResult<Vec<i32>> {
        let mut results = vec![0; channels.len()];
        let status = unsafe {
            (self.library.table().start_channels)(
                self.id,
                channels.as_ptr(),
                results.as_mut_ptr(),
                channels.len() as u8,
            )
        };
        EclError::check("BL_StartChannels", status)?;
        Ok(results)
    }

    pub fn stop_channel(&self, channel: u8) -> EclResult<()> {
        let status = unsafe { (self.library.table().stop_channel)(self.id, channel) };
        EclError::check("BL_StopChannel", status)
    }

    pub fn stop_channels(&self, channels: &[u8]) -> EclResult<Vec<i32>> {
        let mut results = vec![0; channels.len()];
        let status = unsafe {
            (self.library.table().stop_channels)(
                self.id,
                channels.as_ptr(),
                results.as_mut_ptr(),
                channels.len() as u8,
            )
        };
        EclError::check("BL_StopChannels", status)?;
        Ok(results)
    }

    /// Instantaneous measurement snapshot for a channel.
    pub fn current_values(&self, channel: u8) -> EclResult<CurrentValues> {
        let mut raw = RawCurrentValues::default();
        let status =
            unsafe { (self.library.table().get_current_values)(self.id, channel, &mut raw) };
        EclError::check("BL_GetCurrentValues", status)?;
        Ok(decode_current_values(&raw))
    }

    /// Drain one data buffer from a channel and decode it.
    ///
    /// Returns an empty [`ChannelData`] when the channel has produced
    /// nothing since the last call.
    pub fn get_data(&self, channel: u8) -> EclResult<(ChannelData, CurrentValues)> {
        self.fetch_data(channel, false)
    }

    /// Same as [`get_data`], for the FCT (fuel-cell tester) data stream.
    ///
    /// [`get_data`]: EclDevice::get_data
    pub fn get_fct_data(&self, channel: u8) -> EclResult<(ChannelData, CurrentValues)> {
        self.fetch_data(channel, true)
    }

    fn fetch_data(&self, channel: u8, fct: bool) -> EclResult<(ChannelData, CurrentValues)> {
        let mut buffer = Box::new(DataBuffer::default());
        let mut infos = DataInfos::default();
        let mut raw_values = RawCurrentValues::default();
        let entry = if fct {
            self.library.table().get_fct_data
        } else {
            self.library.table().get_data
        };
        let status = unsafe {
            entry(
                self.id,
                channel,
                buffer.as_mut(),
                &mut infos,
                &mut raw_values,
            )
        };
        EclError::check(if fct { "BL_GetFCTData" } else { "BL_GetData" }, status)?;
        let values = decode_current_values(&raw_values);
        let data = decode_buffer(
            &buffer.data,
            &infos,
            values.time_base,
            self.is_vmp4_series(),
            |word| self.library.convert_numeric_into_single(word),
        )?;
        Ok((data, values))
    }

    pub fn experiment_info(&self, channel: u8) -> EclResult<ExperimentInfo> {
        let mut raw = ExperimentInfos::default();
        let status =
            unsafe { (self.library.table().get_experiment_infos)(self.id, channel, &mut raw) };
        EclError::check("BL_GetExperimentInfos", status)?;
        let bytes: Vec<u8> = raw.filename.iter().map(|&c| c as u8).collect();
        Ok(ExperimentInfo {
            group: raw.group,
            time_hms: raw.time_hms,
            time_ymd: raw.time_ymd,
            filename: read_c_buffer(&bytes, "BL_GetExperimentInfos")?,
        })
    }

    pub fn set_experiment_info(&self, channel: u8, info: &ExperimentInfo) -> EclResult<()> {
        let raw = encode_experiment_info(info)?;
        let status =
            unsafe { (self.library.table().set_experiment_infos)(self.id, channel, raw) };
        EclError::check("BL_SetExperimentInfos", status)
    }

    /// Send a raw message to a channel firmware; returns the bytes the
    /// firmware consumed.
    pub fn send_msg(&self, channel: u8, payload: &[u8]) -> EclResult<usize> {
        let mut buf = payload.to_vec();
        let mut len = buf.len() as c_uint;
        let status = unsafe {
            (self.library.table().send_msg)(
                self.id,
                channel,
                buf.as_mut_ptr() as *mut c_void,
                &mut len,
            )
        };
        EclError::check("BL_SendMsg", status)?;
        Ok(len as usize)
    }
}

impl Drop for EclDevice {
    fn drop(&mut self) {
        if !self.connected {
            return;
        }
        let status = unsafe { (self.library.table().disconnect)(self.id) };
        if status != 0 {
            tracing::warn!(
                id = self.id,
                address = %self.address,
                status,
                "Disconnect on drop failed"
            );
        }
    }
}

fn encode_experiment_info(info: &ExperimentInfo) -> EclResult<ExperimentInfos> {
    if info.filename.len() >= 256 {
        return Err(EclError::InvalidParameter {
            name: "filename".to_owned(),
            reason: "file name exceeds the 255 byte wire limit".to_owned(),
        });
    }
    let mut raw = ExperimentInfos {
        group: info.group,
        time_hms: info.time_hms,
        time_ymd: info.time_ymd,
        ..ExperimentInfos::default()
    };
    for (dst, src) in raw.filename.iter_mut().zip(info.filename.bytes()) {
        *dst = src as c_char;
    }
    Ok(raw)
}

fn to_cstring(name: &str, value: &str) -> EclResult<CString> {
    CString::new(value).map_err(|_| EclError::InvalidParameter {
        name: name.to_owned(),
        reason: "value contains an interior NUL byte".to_owned(),
    })
}

fn decode_device_info(raw: &DeviceInfos) -> DeviceInfo {
    DeviceInfo {
        device_code: DeviceCode::from_raw(raw.device_code),
        ram_size: raw.ram_size,
        cpu: raw.cpu,
        number_of_channels: raw.number_of_channels,
        number_of_slots: raw.number_of_slots,
        firmware_version: raw.firmware_version,
        firmware_date_yyyy: raw.firmware_date_yyyy,
        firmware_date_mm: raw.firmware_date_mm,
        firmware_date_dd: raw.firmware_date_dd,
        ht_display_on: raw.ht_display_on,
        connected_pc_count: raw.nb_of_connected_pc,
    }
}

fn decode_channel_info(raw: &ChannelInfos) -> ChannelInfo {
    ChannelInfo {
        channel: raw.channel,
        board_version: raw.board_version,
        board_serial_number: raw.board_serial_number,
        firmware_code: FirmwareCode::from_raw(raw.firmware_code),
        firmware_version: raw.firmware_version,
        xilinx_version: raw.xilinx_version,
        amplifier_code: raw.amp_code,
        amplifier_count: raw.nb_amps,
        lc_board: raw.lc_board,
        z_board: raw.z_board,
        mem_size: raw.mem_size,
        mem_filled: raw.mem_filled,
        state: ChannelState::from_raw(raw.state),
        max_current_range: CurrentRange::from_raw(raw.max_i_range),
        min_current_range: CurrentRange::from_raw(raw.min_i_range),
        max_bandwidth: Bandwidth::from_raw(raw.max_bandwidth),
        loaded_techniques: raw.nb_of_techniques,
    }
}

fn decode_current_values(raw: &RawCurrentValues) -> CurrentValues {
    CurrentValues {
        state: ChannelState::from_raw(raw.state),
        mem_filled: raw.mem_filled,
        time_base: raw.time_base,
        ewe: raw.ewe,
        ewe_range_min: raw.ewe_range_min,
        ewe_range_max: raw.ewe_range_max,
        ece: raw.ece,
        ece_range_min: raw.ece_range_min,
        ece_range_max: raw.ece_range_max,
        e_overflow: raw.e_overflow,
        current: raw.i,
        current_range: CurrentRange::from_raw(raw.i_range),
        i_overflow: raw.i_overflow,
        elapsed_time: raw.elapsed_time,
        frequency: raw.freq,
        r_comp: raw.r_comp,
        saturation: raw.saturation,
        opt_error: raw.opt_err,
        opt_position: raw.opt_pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_info_decoding() {
        let raw = DeviceInfos {
            device_code: 14,
            number_of_channels: 16,
            firmware_version: 1130,
            ..DeviceInfos::default()
        };
        let info = decode_device_info(&raw);
        assert_eq!(info.device_code, DeviceCode::Sp150);
        assert_eq!(info.number_of_channels, 16);
        assert!(!info.device_code.is_vmp4_series());
    }

    #[test]
    fn channel_info_decoding() {
        let raw = ChannelInfos {
            channel: 3,
            firmware_code: 5,
            state: 1,
            max_i_range: 10,
            min_i_range: 0,
            ..ChannelInfos::default()
        };
        let info = decode_channel_info(&raw);
        assert_eq!(info.channel, 3);
        assert!(info.is_kernel_loaded());
        assert!(info.state.is_running());
        assert_eq!(info.max_current_range, CurrentRange::I1A);
        assert_eq!(info.min_current_range, CurrentRange::I100pA);
    }

    #[test]
    fn current_values_decoding() {
        let raw = RawCurrentValues {
            state: 0,
            time_base: 2.0e-5,
            ewe: 3.2,
            i: 1.0e-3,
            i_range: 7,
            elapsed_time: 12.5,
            ..RawCurrentValues::default()
        };
        let values = decode_current_values(&raw);
        assert_eq!(values.state, ChannelState::Stop);
        assert_eq!(values.time_base, 2.0e-5);
        assert_eq!(values.current_range, CurrentRange::I1mA);
        assert_eq!(values.current, 1.0e-3);
    }

    #[test]
    fn experiment_info_encoding() {
        let info = ExperimentInfo {
            group: 1,
            time_hms: 143000,
            time_ymd: 20260115,
            filename: "run01.mpr".to_owned(),
        };
        let raw = encode_experiment_info(&info).unwrap();
        assert_eq!(raw.group, 1);
        assert_eq!(raw.filename[0], b'r' as c_char);
        assert_eq!(raw.filename[9], 0);

        let oversized = ExperimentInfo {
            filename: "x".repeat(300),
            ..ExperimentInfo::default()
        };
        assert!(matches!(
            encode_experiment_info(&oversized),
            Err(EclError::InvalidParameter { .. })
        ));
    }
}
