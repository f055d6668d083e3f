//! # lib-types
//!
//! Core type definitions for EC-Kernel potentiostat control.
//!
//! This crate provides foundational types used throughout the EC-Kernel workspace:
//! - Device identification codes and device metadata
//! - Channel state, ranges and per-channel board information
//! - Technique identifiers and technique parameter values
//! - Vendor status codes with human-readable descriptions
//!
//! Nothing in this crate touches FFI; these are plain Rust values that the
//! `lib-eclib-ffi` crate converts to and from the vendor's wire structures.

pub mod channel;
pub mod device;
pub mod status;
pub mod technique;

pub use channel::*;
pub use device::*;
pub use status::*;
pub use technique::*;
