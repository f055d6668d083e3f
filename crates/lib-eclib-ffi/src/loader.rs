//! Dynamic library loading for the EClib OEM library.
//!
//! This module handles loading the vendor-supplied shared library and
//! resolving the fixed set of `BL_*` entry points into a function table.
//! Resolution is all-or-nothing: every symbol is attempted even after the
//! first failure so that a load error lists the complete set of missing
//! entry points.

use crate::error::{EclError, EclResult};
use crate::raw::{
    ChannelInfos, CurrentValues, DataBuffer, DataInfos, DeviceInfos, EccParam, EccParams,
    ExperimentInfos, HardwareConf,
};
use libloading::Library;
use lib_types::{ParamValue, TechParam};
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_void};
use std::path::Path;
use std::sync::Arc;

/// Function signature for `BL_Connect`.
///
/// ```c
/// int BL_Connect(const char* address, uint8 timeout,
///                int* pID, TDeviceInfos_t* pInfos);
/// ```
///
/// All entry points use the `stdcall` convention on 32-bit Windows, which
/// `extern "system"` selects automatically per target.
pub type BlConnectFn = unsafe extern "system" fn(
    address: *const c_char,
    timeout: c_uchar,
    id: *mut c_int,
    infos: *mut DeviceInfos,
) -> c_int;

/// `BL_GetLibVersion(pVersion, &size)`.
pub type BlGetLibVersionFn =
    unsafe extern "system" fn(version: *mut c_char, size: *mut c_uint) -> c_int;

/// `BL_GetVolumeSerialNumber()`.
pub type BlGetVolumeSerialNumberFn = unsafe extern "system" fn() -> c_uint;

/// `BL_GetErrorMsg(errorcode, pmsg, &size)`.
pub type BlGetErrorMsgFn =
    unsafe extern "system" fn(errorcode: c_int, msg: *mut c_char, size: *mut c_uint) -> c_int;

/// `BL_Disconnect(ID)`.
pub type BlDisconnectFn = unsafe extern "system" fn(id: c_int) -> c_int;

/// `BL_TestConnection(ID)`.
pub type BlTestConnectionFn = unsafe extern "system" fn(id: c_int) -> c_int;

/// `BL_TestCommSpeed(ID, channel, &spd_rcvt, &spd_kernel)`.
pub type BlTestCommSpeedFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    spd_rcvt: *mut c_int,
    spd_kernel: *mut c_int,
) -> c_int;

/// `BL_GetUSBdeviceinfos(index, ...)`. Returns `false` when no device
/// exists at the index; the only boolean-returning entry point.
pub type BlGetUsbDeviceInfosFn = unsafe extern "system" fn(
    usb_index: c_uint,
    company: *mut c_char,
    company_size: *mut c_uint,
    device: *mut c_char,
    device_size: *mut c_uint,
    serial: *mut c_char,
    serial_size: *mut c_uint,
) -> bool;

/// `BL_LoadFirmware(ID, pChannels, pResults, Length, ShowGauge,
/// ForceReload, BinFile, XlxFile)`.
pub type BlLoadFirmwareFn = unsafe extern "system" fn(
    id: c_int,
    channels: *const c_uchar,
    results: *mut c_int,
    length: c_uchar,
    show_gauge: bool,
    force_reload: bool,
    bin_file: *const c_char,
    xlx_file: *const c_char,
) -> c_int;

/// `BL_IsChannelPlugged(ID, ch)`.
pub type BlIsChannelPluggedFn = unsafe extern "system" fn(id: c_int, channel: c_uchar) -> bool;

/// `BL_GetChannelsPlugged(ID, pChPlugged, Size)`.
pub type BlGetChannelsPluggedFn =
    unsafe extern "system" fn(id: c_int, plugged: *mut c_uchar, size: c_uchar) -> c_int;

/// `BL_GetChannelInfos(ID, ch, &infos)`.
pub type BlGetChannelInfosFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, infos: *mut ChannelInfos) -> c_int;

/// `BL_GetMessage(ID, ch, msg, &size)`.
pub type BlGetMessageFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    msg: *mut c_char,
    size: *mut c_uint,
) -> c_int;

/// `BL_GetHardConf(ID, ch, &conf)`.
pub type BlGetHardConfFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, conf: *mut HardwareConf) -> c_int;

/// `BL_SetHardConf(ID, ch, conf)`; the configuration is passed by value.
pub type BlSetHardConfFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, conf: HardwareConf) -> c_int;

/// `BL_LoadTechnique(ID, channel, pFName, Params, First, Last, Display)`.
pub type BlLoadTechniqueFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    file_name: *const c_char,
    params: EccParams,
    first_technique: bool,
    last_technique: bool,
    display_params: bool,
) -> c_int;

/// `BL_DefineBoolParameter(lbl, value, index, &param)`.
pub type BlDefineBoolParameterFn = unsafe extern "system" fn(
    label: *const c_char,
    value: bool,
    index: c_int,
    param: *mut EccParam,
) -> c_int;

/// `BL_DefineSglParameter(lbl, value, index, &param)`.
pub type BlDefineSglParameterFn = unsafe extern "system" fn(
    label: *const c_char,
    value: f32,
    index: c_int,
    param: *mut EccParam,
) -> c_int;

/// `BL_DefineIntParameter(lbl, value, index, &param)`.
pub type BlDefineIntParameterFn = unsafe extern "system" fn(
    label: *const c_char,
    value: c_int,
    index: c_int,
    param: *mut EccParam,
) -> c_int;

/// `BL_UpdateParameters(ID, channel, TechIndx, Params, EccFileName)`.
pub type BlUpdateParametersFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    tech_index: c_int,
    params: EccParams,
    ecc_file_name: *const c_char,
) -> c_int;

/// `BL_StartChannel(ID, channel)`.
pub type BlStartChannelFn = unsafe extern "system" fn(id: c_int, channel: c_uchar) -> c_int;

/// `BL_StartChannels(ID, pChannels, pResults, length)`.
pub type BlStartChannelsFn = unsafe extern "system" fn(
    id: c_int,
    channels: *const c_uchar,
    results: *mut c_int,
    length: c_uchar,
) -> c_int;

/// `BL_StopChannel(ID, channel)`.
pub type BlStopChannelFn = unsafe extern "system" fn(id: c_int, channel: c_uchar) -> c_int;

/// `BL_StopChannels(ID, pChannels, pResults, length)`.
pub type BlStopChannelsFn = unsafe extern "system" fn(
    id: c_int,
    channels: *const c_uchar,
    results: *mut c_int,
    length: c_uchar,
) -> c_int;

/// `BL_GetCurrentValues(ID, channel, &values)`.
pub type BlGetCurrentValuesFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, values: *mut CurrentValues) -> c_int;

/// `BL_GetData(ID, channel, &buf, &infos, &values)`.
pub type BlGetDataFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    buf: *mut DataBuffer,
    infos: *mut DataInfos,
    values: *mut CurrentValues,
) -> c_int;

/// `BL_GetFCTData(ID, channel, &buf, &infos, &values)`.
pub type BlGetFctDataFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    buf: *mut DataBuffer,
    infos: *mut DataInfos,
    values: *mut CurrentValues,
) -> c_int;

/// `BL_ConvertNumericIntoSingle(num, &sgl)`.
pub type BlConvertNumericIntoSingleFn =
    unsafe extern "system" fn(num: c_uint, sgl: *mut f32) -> c_int;

/// `BL_SetExperimentInfos(ID, channel, infos)`; the record is passed by
/// value.
pub type BlSetExperimentInfosFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, infos: ExperimentInfos) -> c_int;

/// `BL_GetExperimentInfos(ID, channel, &infos)`.
pub type BlGetExperimentInfosFn =
    unsafe extern "system" fn(id: c_int, channel: c_uchar, infos: *mut ExperimentInfos) -> c_int;

/// `BL_SendMsg(ID, ch, pBuf, &len)`.
pub type BlSendMsgFn = unsafe extern "system" fn(
    id: c_int,
    channel: c_uchar,
    buf: *mut c_void,
    len: *mut c_uint,
) -> c_int;

/// `BL_LoadFlash(ID, pfname, ShowGauge)`.
pub type BlLoadFlashFn =
    unsafe extern "system" fn(id: c_int, file_name: *const c_char, show_gauge: bool) -> c_int;

/// Declares the function table and its resolver.
///
/// The resolver looks up every symbol unconditionally, collecting the
/// names that fail, and only assembles the table when all of them
/// resolved.
macro_rules! ecl_function_table {
    ($(($field:ident, $ty:ty, $symbol:literal)),+ $(,)?) => {
        /// Resolved entry points of a loaded EClib library.
        pub(crate) struct EclFunctionTable {
            $(pub(crate) $field: $ty,)+
        }

        impl EclFunctionTable {
            fn resolve(library: &Library, path: &str) -> EclResult<Self> {
                let mut missing: Vec<String> = Vec::new();
                $(
                    let $field: Option<$ty> =
                        match unsafe { library.get::<$ty>(concat!($symbol, "\0").as_bytes()) } {
                            Ok(symbol) => Some(*symbol),
                            Err(_) => {
                                tracing::warn!(symbol = $symbol, path, "entry point not found");
                                missing.push($symbol.to_owned());
                                None
                            }
                        };
                )+
                if let ($(Some($field),)+) = ($($field,)+) {
                    Ok(Self { $($field,)+ })
                } else {
                    Err(EclError::MissingSymbols {
                        path: path.to_owned(),
                        symbols: missing,
                    })
                }
            }
        }
    };
}

ecl_function_table! {
    (get_lib_version, BlGetLibVersionFn, "BL_GetLibVersion"),
    (get_volume_serial_number, BlGetVolumeSerialNumberFn, "BL_GetVolumeSerialNumber"),
    (get_error_msg, BlGetErrorMsgFn, "BL_GetErrorMsg"),
    (connect, BlConnectFn, "BL_Connect"),
    (disconnect, BlDisconnectFn, "BL_Disconnect"),
    (test_connection, BlTestConnectionFn, "BL_TestConnection"),
    (test_comm_speed, BlTestCommSpeedFn, "BL_TestCommSpeed"),
    (get_usb_device_infos, BlGetUsbDeviceInfosFn, "BL_GetUSBdeviceinfos"),
    (load_firmware, BlLoadFirmwareFn, "BL_LoadFirmware"),
    (is_channel_plugged, BlIsChannelPluggedFn, "BL_IsChannelPlugged"),
    (get_channels_plugged, BlGetChannelsPluggedFn, "BL_GetChannelsPlugged"),
    (get_channel_infos, BlGetChannelInfosFn, "BL_GetChannelInfos"),
    (get_message, BlGetMessageFn, "BL_GetMessage"),
    (get_hard_conf, BlGetHardConfFn, "BL_GetHardConf"),
    (set_hard_conf, BlSetHardConfFn, "BL_SetHardConf"),
    (load_technique, BlLoadTechniqueFn, "BL_LoadTechnique"),
    (define_bool_parameter, BlDefineBoolParameterFn, "BL_DefineBoolParameter"),
    (define_sgl_parameter, BlDefineSglParameterFn, "BL_DefineSglParameter"),
    (define_int_parameter, BlDefineIntParameterFn, "BL_DefineIntParameter"),
    (update_parameters, BlUpdateParametersFn, "BL_UpdateParameters"),
    (start_channel, BlStartChannelFn, "BL_StartChannel"),
    (start_channels, BlStartChannelsFn, "BL_StartChannels"),
    (stop_channel, BlStopChannelFn, "BL_StopChannel"),
    (stop_channels, BlStopChannelsFn, "BL_StopChannels"),
    (get_current_values, BlGetCurrentValuesFn, "BL_GetCurrentValues"),
    (get_data, BlGetDataFn, "BL_GetData"),
    (get_fct_data, BlGetFctDataFn, "BL_GetFCTData"),
    (convert_numeric_into_single, BlConvertNumericIntoSingleFn, "BL_ConvertNumericIntoSingle"),
    (set_experiment_infos, BlSetExperimentInfosFn, "BL_SetExperimentInfos"),
    (get_experiment_infos, BlGetExperimentInfosFn, "BL_GetExperimentInfos"),
    (send_msg, BlSendMsgFn, "BL_SendMsg"),
    (load_flash, BlLoadFlashFn, "BL_LoadFlash"),
}

/// Identity of a USB-attached instrument, from `BL_GetUSBdeviceinfos`.
#[derive(Clone, Debug)]
pub struct UsbDeviceInfo {
    pub index: u32,
    pub company: String,
    pub device: String,
    pub serial_number: String,
}

/// Loaded EClib library with its resolved function table.
pub struct EclLibrary {
    /// The underlying dynamic library handle. Never used directly after
    /// resolution, but it must stay alive as long as the table does.
    #[allow(dead_code)]
    library: Library,

    /// Path the library was loaded from.
    pub path: String,

    table: EclFunctionTable,
}

impl EclLibrary {
    /// Load the EClib shared library and resolve its full function table.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to `EClib.dll` / `EClib64.dll` (Windows) or the
    ///   equivalent shared object on other platforms
    ///
    /// # Safety
    ///
    /// The file must be the genuine OEM library. The resolved entry
    /// points are native code; a library exporting the right names with
    /// the wrong ABI causes undefined behavior on first call.
    pub fn load<P: AsRef<Path>>(path: P) -> EclResult<Arc<Self>> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        if path_str.is_empty() {
            return Err(EclError::InvalidPath {
                reason: "library path is empty",
            });
        }

        let library = unsafe { Library::new(path) }.map_err(|e| EclError::Load {
            path: path_str.clone(),
            source: e,
        })?;

        let table = EclFunctionTable::resolve(&library, &path_str)?;

        tracing::info!(path = %path_str, "Loaded EClib library");

        Ok(Arc::new(Self {
            library,
            path: path_str,
            table,
        }))
    }

    pub(crate) fn table(&self) -> &EclFunctionTable {
        &self.table
    }

    /// Library version string, e.g. `"6.04"`.
    pub fn lib_version(&self) -> EclResult<String> {
        let mut buf = [0u8; 64];
        let mut size = buf.len() as c_uint;
        let raw = unsafe {
            (self.table.get_lib_version)(buf.as_mut_ptr() as *mut c_char, &mut size)
        };
        EclError::check("BL_GetLibVersion", raw)?;
        read_c_buffer(&buf, "BL_GetLibVersion")
    }

    /// Serial number of the volume the library resides on.
    pub fn volume_serial_number(&self) -> u32 {
        unsafe { (self.table.get_volume_serial_number)() }
    }

    /// Human-readable message for a vendor status code.
    pub fn error_message(&self, code: i32) -> EclResult<String> {
        let mut buf = [0u8; 256];
        let mut size = buf.len() as c_uint;
        let raw = unsafe {
            (self.table.get_error_msg)(code, buf.as_mut_ptr() as *mut c_char, &mut size)
        };
        EclError::check("BL_GetErrorMsg", raw)?;
        read_c_buffer(&buf, "BL_GetErrorMsg")
    }

    /// Identity of the USB instrument at `index`, or `None` when no
    /// device is enumerated there.
    pub fn usb_device_info(&self, index: u32) -> EclResult<Option<UsbDeviceInfo>> {
        let mut company = [0u8; 128];
        let mut company_size = company.len() as c_uint;
        let mut device = [0u8; 128];
        let mut device_size = device.len() as c_uint;
        let mut serial = [0u8; 128];
        let mut serial_size = serial.len() as c_uint;
        let present = unsafe {
            (self.table.get_usb_device_infos)(
                index,
                company.as_mut_ptr() as *mut c_char,
                &mut company_size,
                device.as_mut_ptr() as *mut c_char,
                &mut device_size,
                serial.as_mut_ptr() as *mut c_char,
                &mut serial_size,
            )
        };
        if !present {
            return Ok(None);
        }
        Ok(Some(UsbDeviceInfo {
            index,
            company: read_c_buffer(&company, "BL_GetUSBdeviceinfos")?,
            device: read_c_buffer(&device, "BL_GetUSBdeviceinfos")?,
            serial_number: read_c_buffer(&serial, "BL_GetUSBdeviceinfos")?,
        }))
    }

    /// Decode one raw acquisition word into a single-precision float.
    ///
    /// Acquisition buffers transport floats as `u32` bit patterns whose
    /// exact encoding belongs to the vendor; this is the only sanctioned
    /// decoder.
    pub fn convert_numeric_into_single(&self, num: u32) -> EclResult<f32> {
        let mut value = 0f32;
        let raw = unsafe { (self.table.convert_numeric_into_single)(num, &mut value) };
        EclError::check("BL_ConvertNumericIntoSingle", raw)?;
        Ok(value)
    }

    /// Marshal one technique parameter through the matching
    /// `BL_Define*Parameter` entry point.
    pub fn define_parameter(&self, param: &TechParam) -> EclResult<EccParam> {
        let label = CString::new(param.label.as_str()).map_err(|_| EclError::InvalidParameter {
            name: param.label.clone(),
            reason: "label contains an interior NUL byte".to_owned(),
        })?;
        let mut out = EccParam::default();
        let (function, raw) = match param.value {
            ParamValue::Bool(v) => ("BL_DefineBoolParameter", unsafe {
                (self.table.define_bool_parameter)(label.as_ptr(), v, param.index, &mut out)
            }),
            ParamValue::Int(v) => ("BL_DefineIntParameter", unsafe {
                (self.table.define_int_parameter)(label.as_ptr(), v, param.index, &mut out)
            }),
            ParamValue::Single(v) => ("BL_DefineSglParameter", unsafe {
                (self.table.define_sgl_parameter)(label.as_ptr(), v, param.index, &mut out)
            }),
        };
        EclError::check(function, raw)?;
        Ok(out)
    }
}

// EclLibrary is Send + Sync: the table holds plain function pointers and
// the Library handle itself is thread-safe to keep alive.
unsafe impl Send for EclLibrary {}
unsafe impl Sync for EclLibrary {}

// The table is all function pointers; report the path only.
impl std::fmt::Debug for EclLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EclLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Read a NUL-terminated string out of a fixed buffer the library filled.
pub(crate) fn read_c_buffer(buf: &[u8], function: &'static str) -> EclResult<String> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(EclError::InvalidString { function })?;
    std::str::from_utf8(&buf[..end])
        .map(|s| s.trim_end().to_owned())
        .map_err(|_| EclError::InvalidString { function })
}

/// Owner of the library binding lifecycle.
///
/// A binder holds at most one loaded library. [`initialize`] tears down
/// any previous binding before loading the new one, and the binding
/// counts as established only once every entry point resolved. Handles
/// given out by [`library`] are reference-counted, so a binding released
/// while calls are in flight stays alive until the last handle drops.
///
/// [`initialize`]: EclBinder::initialize
/// [`library`]: EclBinder::library
#[derive(Default)]
pub struct EclBinder {
    library: Option<Arc<EclLibrary>>,
}

impl EclBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the library at `path` and make it the current binding.
    ///
    /// On failure the binder is left empty: a binder never exposes a
    /// partially resolved library.
    pub fn initialize<P: AsRef<Path>>(&mut self, path: P) -> EclResult<Arc<EclLibrary>> {
        self.teardown();
        let library = EclLibrary::load(path)?;
        self.library = Some(Arc::clone(&library));
        Ok(library)
    }

    /// Release the current binding. Idempotent; never fails.
    pub fn teardown(&mut self) {
        if let Some(library) = self.library.take() {
            tracing::debug!(path = %library.path, "Released EClib binding");
        }
    }

    /// The current binding, if one is established.
    pub fn library(&self) -> Option<&Arc<EclLibrary>> {
        self.library.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.library.is_some()
    }
}

/// Conventional file name of the OEM library on the current platform.
#[cfg(all(windows, target_pointer_width = "64"))]
pub fn default_library_name() -> &'static str {
    "EClib64.dll"
}

#[cfg(all(windows, target_pointer_width = "32"))]
pub fn default_library_name() -> &'static str {
    "EClib.dll"
}

#[cfg(target_os = "macos")]
pub fn default_library_name() -> &'static str {
    "libeclib.dylib"
}

#[cfg(not(any(windows, target_os = "macos")))]
pub fn default_library_name() -> &'static str {
    "libeclib.so"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_path_is_rejected_before_loading() {
        let mut binder = EclBinder::new();
        let err = binder.initialize("").unwrap_err();
        assert!(matches!(err, EclError::InvalidPath { .. }));
        assert!(!binder.is_ready());
    }

    #[test]
    fn missing_file_reports_load_error() {
        let mut binder = EclBinder::new();
        let err = binder.initialize("/nonexistent/EClib64.dll").unwrap_err();
        assert!(matches!(err, EclError::Load { .. }));
        assert!(!binder.is_ready());
    }

    #[test]
    fn garbage_file_reports_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a shared library").unwrap();
        let mut binder = EclBinder::new();
        let err = binder.initialize(file.path()).unwrap_err();
        assert!(matches!(err, EclError::Load { .. }));
    }

    // A real shared object that exports none of the BL_* entry points
    // must fail with the complete list of missing names, not just the
    // first one. Skipped quietly when no system libm is found.
    #[test]
    #[cfg(unix)]
    fn foreign_library_lists_every_missing_symbol() {
        let candidates = [
            "/lib/x86_64-linux-gnu/libm.so.6",
            "/usr/lib/x86_64-linux-gnu/libm.so.6",
            "/usr/lib/aarch64-linux-gnu/libm.so.6",
            "/usr/lib/libm.dylib",
        ];
        let Some(path) = candidates
            .iter()
            .find(|p| std::path::Path::new(p).exists())
        else {
            return;
        };

        let mut binder = EclBinder::new();
        let err = binder.initialize(path).unwrap_err();
        match err {
            EclError::MissingSymbols { symbols, .. } => {
                assert_eq!(symbols.len(), 32);
                assert!(symbols.iter().all(|s| s.starts_with("BL_")));
                assert!(symbols.contains(&"BL_Connect".to_owned()));
                assert!(symbols.contains(&"BL_LoadFlash".to_owned()));
            }
            other => panic!("expected MissingSymbols, got {other:?}"),
        }
        assert!(!binder.is_ready());
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut binder = EclBinder::new();
        binder.teardown();
        binder.teardown();
        assert!(!binder.is_ready());
        assert!(binder.library().is_none());
    }

    #[test]
    fn failed_initialize_clears_previous_binding() {
        // No real library to load in tests, but a failed initialize must
        // still leave the binder empty rather than half-bound.
        let mut binder = EclBinder::new();
        let _ = binder.initialize("/nonexistent/EClib64.dll");
        assert!(binder.library().is_none());
    }

    #[test]
    fn read_c_buffer_stops_at_nul() {
        let buf = b"6.04\0garbage";
        assert_eq!(read_c_buffer(buf, "test").unwrap(), "6.04");
        let unterminated = b"no nul here!";
        assert!(matches!(
            read_c_buffer(unterminated, "test"),
            Err(EclError::InvalidString { .. })
        ));
    }

    #[test]
    fn default_library_name_matches_platform() {
        let name = default_library_name();
        assert!(name.starts_with("EClib") || name.starts_with("libeclib"));
    }
}
