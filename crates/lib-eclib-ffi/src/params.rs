//! Technique parameter marshalling.
//!
//! Experiment parameters are defined one at a time through the vendor's
//! `BL_Define*Parameter` entry points, which fill opaque [`EccParam`]
//! records. A [`EccParamSet`] owns the filled records and hands out the
//! borrowed array header (`TEccParams_t`) that `BL_LoadTechnique` and
//! `BL_UpdateParameters` expect.

use crate::error::{EclError, EclResult};
use crate::loader::EclLibrary;
use crate::raw::{EccParam, EccParams};
use lib_types::TechParam;

/// An owned, vendor-encoded technique parameter array.
pub struct EccParamSet {
    params: Vec<EccParam>,
}

impl EccParamSet {
    /// Encode `params` through the library's define entry points.
    ///
    /// Parameter order is preserved; multi-step techniques rely on the
    /// index carried by each [`TechParam`], not on position.
    pub fn define(library: &EclLibrary, params: &[TechParam]) -> EclResult<Self> {
        if params.len() > i32::MAX as usize {
            return Err(EclError::InvalidParameter {
                name: "params".to_owned(),
                reason: "too many parameters for the wire header".to_owned(),
            });
        }
        let mut encoded = Vec::with_capacity(params.len());
        for param in params {
            encoded.push(library.define_parameter(param)?);
        }
        Ok(Self { params: encoded })
    }

    /// An empty parameter set, for techniques that take none.
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The array header passed by value to the vendor.
    ///
    /// The header borrows this set's storage; the set must outlive the
    /// call it is passed to. Callers in this crate hold `&mut self` for
    /// the duration of the FFI call, which is enough.
    pub(crate) fn as_raw(&mut self) -> EccParams {
        EccParams {
            len: self.params.len() as i32,
            params: if self.params.is_empty() {
                std::ptr::null_mut()
            } else {
                self.params.as_mut_ptr()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_yields_null_header() {
        let mut set = EccParamSet::empty();
        assert!(set.is_empty());
        let raw = set.as_raw();
        // Copy fields out; the header is packed.
        let (len, ptr) = (raw.len, raw.params);
        assert_eq!(len, 0);
        assert!(ptr.is_null());
    }

    #[test]
    fn header_reflects_storage() {
        let mut set = EccParamSet {
            params: vec![EccParam::default(); 3],
        };
        assert_eq!(set.len(), 3);
        let raw = set.as_raw();
        let (len, ptr) = (raw.len, raw.params);
        assert_eq!(len, 3);
        assert!(!ptr.is_null());
    }
}
