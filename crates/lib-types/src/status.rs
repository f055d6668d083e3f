//! Vendor status codes.
//!
//! Every EClib entry point that does not return a boolean reports one of
//! these codes. Zero is success; everything else is grouped by subsystem
//! (general, instrument, communication, firmware, technique). The
//! descriptions mirror the OEM package documentation so diagnostics read
//! the same as the vendor tools.

use serde::{Deserialize, Serialize};

/// Status code returned by the vendor library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: Self = Self(0);

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// Human-readable description of the code.
    pub fn description(&self) -> &'static str {
        match self.0 {
            0 => "no error",
            // General
            -1 => "no instrument connected",
            -2 => "connection in progress",
            -3 => "selected channel(s) unplugged",
            -4 => "invalid function parameters",
            -5 => "selected file does not exist",
            -6 => "function failed",
            -7 => "no channel selected",
            -8 => "invalid instrument configuration",
            -9 => "EC-Lab firmware loaded on the instrument",
            -10 => "library not correctly loaded in memory",
            -11 => "USB library not correctly loaded in memory",
            -12 => "function of the library already in progress",
            -13 => "selected channel(s) already used",
            -14 => "device not allowed",
            -15 => "invalid update function parameters",
            // Instrument
            -101 => "internal instrument communication failed",
            -102 => "too many data to transfer from the instrument",
            -103 => "selected channel(s) unplugged (device error)",
            -104 => "instrument response error",
            -105 => "invalid message size",
            // Communication
            -200 => "communication failed with the instrument",
            -201 => "cannot establish connection with the instrument",
            -202 => "waiting for the instrument response",
            -203 => "invalid IP address",
            -204 => "cannot allocate memory in the instrument",
            -205 => "cannot load firmware into selected channel(s)",
            -206 => "communication firmware not compatible with the library",
            -207 => "maximum number of allowed connections reached",
            // Firmware
            -300 => "cannot find kernel.bin file",
            -301 => "cannot read kernel.bin file",
            -302 => "invalid kernel.bin file",
            -303 => "cannot load kernel.bin on the selected channel(s)",
            -304 => "cannot find FPGA configuration file",
            -305 => "cannot read FPGA configuration file",
            -306 => "invalid FPGA configuration file",
            -307 => "cannot load FPGA configuration on the selected channel(s)",
            -308 => "no firmware loaded on the selected channel(s)",
            -309 => "loaded firmware not compatible with the library",
            // Technique
            -400 => "cannot find the selected ECC file",
            -401 => "ECC file not compatible with the channel firmware",
            -402 => "ECC file corrupted",
            -403 => "cannot load the ECC file",
            -404 => "data returned by the instrument are corrupted",
            -405 => "cannot load techniques: full memory",
            _ => "unknown error code",
        }
    }

    /// Symbolic vendor constant name, for log output.
    pub fn constant_name(&self) -> &'static str {
        match self.0 {
            0 => "ERR_NOERROR",
            -1 => "ERR_GEN_NOTCONNECTED",
            -2 => "ERR_GEN_CONNECTIONINPROGRESS",
            -3 => "ERR_GEN_CHANNELNOTPLUGGED",
            -4 => "ERR_GEN_INVALIDPARAMETERS",
            -5 => "ERR_GEN_FILENOTEXISTS",
            -6 => "ERR_GEN_FUNCTIONFAILED",
            -7 => "ERR_GEN_NOCHANNELELECTED",
            -8 => "ERR_GEN_INVALIDCONF",
            -9 => "ERR_GEN_ECLAB_LOADED",
            -10 => "ERR_GEN_LIBNOTCORRECTLYLOADED",
            -11 => "ERR_GEN_USBLIBRARYERROR",
            -12 => "ERR_GEN_FUNCTIONINPROGRESS",
            -13 => "ERR_GEN_CHANNEL_RUNNING",
            -14 => "ERR_GEN_DEVICE_NOTALLOWED",
            -15 => "ERR_GEN_UPDATEPARAMETERS",
            -101 => "ERR_INSTR_VMEERROR",
            -102 => "ERR_INSTR_TOOMANYDATA",
            -103 => "ERR_INSTR_RESPNOTPOSSIBLE",
            -104 => "ERR_INSTR_RESPERROR",
            -105 => "ERR_INSTR_MSGSIZEERROR",
            -200 => "ERR_COMM_COMMFAILED",
            -201 => "ERR_COMM_CONNECTIONFAILED",
            -202 => "ERR_COMM_WAITINGACK",
            -203 => "ERR_COMM_INVALIDIPADDRESS",
            -204 => "ERR_COMM_ALLOCMEMFAILED",
            -205 => "ERR_COMM_LOADFIRMWAREFAILED",
            -206 => "ERR_COMM_INCOMPATIBLESERVER",
            -207 => "ERR_COMM_MAXCONNREACHED",
            -300 => "ERR_FIRM_FIRMFILENOTEXISTS",
            -301 => "ERR_FIRM_FIRMFILEACCESSFAILED",
            -302 => "ERR_FIRM_FIRMINVALIDFILE",
            -303 => "ERR_FIRM_FIRMLOADINGFAILED",
            -304 => "ERR_FIRM_XILFILENOTEXISTS",
            -305 => "ERR_FIRM_XILFILEACCESSFAILED",
            -306 => "ERR_FIRM_XILINVALIDFILE",
            -307 => "ERR_FIRM_XILLOADINGFAILED",
            -308 => "ERR_FIRM_FIRMWARENOTLOADED",
            -309 => "ERR_FIRM_FIRMWAREINCOMPATIBLE",
            -400 => "ERR_TECH_ECCFILENOTEXISTS",
            -401 => "ERR_TECH_INCOMPATIBLEECC",
            -402 => "ERR_TECH_ECCFILECORRUPTED",
            -403 => "ERR_TECH_LOADTECHNIQUEFAILED",
            -404 => "ERR_TECH_DATACORRUPTED",
            -405 => "ERR_TECH_MEMFULL",
            _ => "ERR_UNKNOWN",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.0, self.constant_name(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_zero() {
        assert!(StatusCode::OK.is_ok());
        assert!(!StatusCode(-1).is_ok());
    }

    #[test]
    fn descriptions_cover_documented_codes() {
        assert_eq!(StatusCode(-4).description(), "invalid function parameters");
        assert_eq!(StatusCode(-201).constant_name(), "ERR_COMM_CONNECTIONFAILED");
        assert_eq!(StatusCode(-405).description(), "cannot load techniques: full memory");
        assert_eq!(StatusCode(-999).description(), "unknown error code");
    }

    #[test]
    fn display_includes_code_and_text() {
        let s = StatusCode(-6).to_string();
        assert!(s.contains("-6"));
        assert!(s.contains("ERR_GEN_FUNCTIONFAILED"));
        assert!(s.contains("function failed"));
    }
}
