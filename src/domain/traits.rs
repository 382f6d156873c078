// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The logger never touches framework tensors directly. Anything
// the training loop hands over as a layer statistic only has to
// know how to copy itself into a plain host-side array.
//
// Implementations provided here cover the plain Rust shapes a
// statistic usually arrives in (a scalar, a Vec, a slice).
// A tensor type from an ML framework implements the same trait
// in the crate that owns the tensor: device → host copy, then
// `HostArray::new(shape, data)`.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::layer_stats::HostArray;

// ─── ToHostArray ──────────────────────────────────────────────────────────────
/// Anything that can be materialised as a portable numeric array.
///
/// Conversion is fallible because a device-resident value may
/// need a transfer that can fail.
pub trait ToHostArray {
    fn to_host_array(&self) -> Result<HostArray>;
}

impl ToHostArray for HostArray {
    fn to_host_array(&self) -> Result<HostArray> {
        Ok(self.clone())
    }
}

impl ToHostArray for f32 {
    fn to_host_array(&self) -> Result<HostArray> {
        Ok(HostArray::scalar(f64::from(*self)))
    }
}

impl ToHostArray for f64 {
    fn to_host_array(&self) -> Result<HostArray> {
        Ok(HostArray::scalar(*self))
    }
}

impl ToHostArray for [f32] {
    fn to_host_array(&self) -> Result<HostArray> {
        Ok(HostArray::vector(self.iter().copied().map(f64::from).collect()))
    }
}

impl ToHostArray for [f64] {
    fn to_host_array(&self) -> Result<HostArray> {
        Ok(HostArray::vector(self.to_vec()))
    }
}

impl ToHostArray for Vec<f32> {
    fn to_host_array(&self) -> Result<HostArray> {
        self.as_slice().to_host_array()
    }
}

impl ToHostArray for Vec<f64> {
    fn to_host_array(&self) -> Result<HostArray> {
        self.as_slice().to_host_array()
    }
}

impl<T: ToHostArray + ?Sized> ToHostArray for &T {
    fn to_host_array(&self) -> Result<HostArray> {
        (**self).to_host_array()
    }
}
