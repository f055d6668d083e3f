//! # lib-eclib-ffi
//!
//! Safe FFI wrappers for the BioLogic EC-Lab OEM library (`EClib`).
//!
//! This crate provides a safe Rust interface for loading the vendor-supplied
//! shared library (`EClib.dll` / `EClib64.dll` / `libeclib.so`) and driving
//! potentiostat instruments through it. It handles:
//!
//! - Dynamic library loading with `libloading`
//! - Resolution of the full fixed set of `BL_*` entry points into a
//!   validated function table
//! - Connection lifecycle and typed wrappers over every table entry
//! - Technique parameter marshalling (`EccParam` packing)
//! - Decoding of raw acquisition buffers into typed data points
//!
//! # Loading contract
//!
//! The function table is all-or-nothing: either every entry point resolved
//! and the table is usable, or loading fails and no entry may be invoked.
//! A failed load reports *every* missing symbol, not just the first one, so
//! an operator can see at a glance whether they pointed at the wrong DLL or
//! at an older library revision.
//!
//! # Safety
//!
//! The vendor library is closed-source native code. Entry points are only
//! reachable through [`EclLibrary`] / [`EclDevice`], which guarantee the
//! table outlives every call; the per-function behavioral contract
//! (blocking, thread-safety) remains the vendor's and is documented in the
//! OEM development package.

pub mod data;
pub mod device;
pub mod error;
pub mod loader;
pub mod params;
pub mod raw;

pub use data::{decode_buffer, ChannelData, DataPoint, FieldKind, FieldSpec, FieldValue};
pub use device::{EclDevice, ExperimentInfo};
pub use error::{EclError, EclResult};
pub use loader::{default_library_name, EclBinder, EclLibrary, UsbDeviceInfo};
pub use params::EccParamSet;
