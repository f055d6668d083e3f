//! Error types for EClib FFI operations.

use lib_types::StatusCode;
use thiserror::Error;

/// Errors that can occur while loading or driving the vendor library.
#[derive(Debug, Error)]
pub enum EclError {
    /// The library path was empty or otherwise unusable before loading was
    /// even attempted.
    #[error("Invalid library path: {reason}")]
    InvalidPath { reason: &'static str },

    /// Failed to load the shared library.
    #[error("Failed to load library '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// One or more required entry points were not found in the library.
    ///
    /// Resolution always attempts the full symbol set, so `symbols` lists
    /// every missing name.
    #[error("Library '{path}' is missing {} required entry point(s): {}", symbols.len(), symbols.join(", "))]
    MissingSymbols { path: String, symbols: Vec<String> },

    /// A vendor entry point returned a non-zero status code.
    #[error("{function} failed: {status}")]
    Api {
        function: &'static str,
        status: StatusCode,
    },

    /// A string returned by the library was not valid UTF-8 or was not
    /// terminated within its buffer.
    #[error("{function} returned an invalid string")]
    InvalidString { function: &'static str },

    /// An argument could not be passed across the FFI boundary.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A data buffer did not match the layout its header advertised.
    #[error("Data buffer layout error: {0}")]
    DataLayout(String),
}

impl EclError {
    /// Wrap a raw vendor status code, mapping zero to `Ok(())`.
    pub fn check(function: &'static str, raw: i32) -> EclResult<()> {
        let status = StatusCode(raw);
        if status.is_ok() {
            Ok(())
        } else {
            Err(Self::Api { function, status })
        }
    }

    /// The vendor status code, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for EClib operations.
pub type EclResult<T> = Result<T, EclError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_maps_zero_to_ok() {
        assert!(EclError::check("BL_Connect", 0).is_ok());
        let err = EclError::check("BL_Connect", -201).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode(-201)));
        let text = err.to_string();
        assert!(text.contains("BL_Connect"));
        assert!(text.contains("cannot establish connection"));
    }

    #[test]
    fn missing_symbols_lists_all_names() {
        let err = EclError::MissingSymbols {
            path: "EClib64.dll".into(),
            symbols: vec!["BL_Connect".into(), "BL_GetData".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 required entry point(s)"));
        assert!(text.contains("BL_Connect"));
        assert!(text.contains("BL_GetData"));
    }
}
