// ============================================================================
// OPS — image operations outside the GPU pipeline
// ============================================================================

pub mod convolve;

pub use convolve::{apply_kernel, convolve_cpu};
