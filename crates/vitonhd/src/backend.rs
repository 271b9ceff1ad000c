//! Backend that `inspect` stacks dataloader batches on.
//!
//! Batching only moves normalized buffers into `[B, C, H, W]` tensors, so
//! the CPU backend is the default and `wgpu` is the single opt-in
//! alternative for checking device uploads.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "wgpu")] {
        pub type BatchBackend = burn::backend::Wgpu;

        /// Label printed by `inspect` and `info`.
        pub const BACKEND_NAME: &str = "wgpu";
    } else {
        pub type BatchBackend = burn::backend::NdArray;

        /// Label printed by `inspect` and `info`.
        pub const BACKEND_NAME: &str = "ndarray (CPU)";
    }
}

pub type BatchDevice = <BatchBackend as Backend>::Device;

/// Device batches are uploaded to.
pub fn batch_device() -> BatchDevice {
    BatchDevice::default()
}
