// ============================================================================
// ERRORS — typed failures for the render core, kernel input and the CLI
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::shader::ShaderStage;

/// A shader stage failed to compile.  `log` holds the compiler diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{stage} shader failed to compile:\n{log}")]
pub struct ShaderCompileError {
    pub stage: ShaderStage,
    pub log: String,
}

/// The vertex + fragment pair could not be linked into a pipeline.
#[derive(Debug, Clone, Error)]
#[error("program failed to link:\n{log}")]
pub struct ProgramLinkError {
    pub log: String,
}

/// Everything that can stop a single render call.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    ShaderCompile(#[from] ShaderCompileError),

    #[error(transparent)]
    ProgramLink(#[from] ProgramLinkError),

    #[error("no GPU adapter available (hardware or software)")]
    NoAdapter,

    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("source image has zero width or height")]
    EmptyImage,

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize { expected: usize, actual: usize },

    #[error("{width}x{height} exceeds the device texture limit of {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    #[error("surface size {width}x{height} is not drawable")]
    InvalidSurface { width: u32, height: u32 },

    #[error("no successfully rendered frame to read back")]
    NothingRendered,

    #[error("GPU validation error: {0}")]
    Device(String),

    #[error("surface readback failed: {0}")]
    Readback(String),

    #[error("reading back a {width}x{height} surface needs {bytes} bytes, device buffer limit is {max}")]
    ReadbackTooLarge { width: u32, height: u32, bytes: u64, max: u64 },
}

impl RenderError {
    /// Limits of the GPU device that the CPU path does not share.
    pub fn exceeds_device_limits(&self) -> bool {
        matches!(self, RenderError::TextureTooLarge { .. } | RenderError::ReadbackTooLarge { .. })
    }
}

/// Kernel text or values that do not form a 3×3 matrix of finite numbers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("a 3x3 kernel needs exactly 9 values, got {found}")]
    WrongCount { found: usize },

    #[error("kernel entry {index} ('{text}') is not a number")]
    NotANumber { index: usize, text: String },

    #[error("kernel entry {index} is not finite")]
    NonFinite { index: usize },
}

/// Configuration file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {message}")]
    Value { field: &'static str, message: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Top-level error for file-to-file processing.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_limit_errors_allow_cpu_fallback() {
        let readback = RenderError::ReadbackTooLarge {
            width: 9000,
            height: 8000,
            bytes: 288_768_000,
            max: 268_435_456,
        };
        assert!(readback.exceeds_device_limits());
        assert!(readback.to_string().contains("9000x8000"));
        assert!(RenderError::TextureTooLarge { width: 1, height: 1, max: 0 }.exceeds_device_limits());
        assert!(!RenderError::NothingRendered.exceeds_device_limits());
        assert!(!RenderError::ProgramLink(ProgramLinkError { log: String::new() }).exceeds_device_limits());
    }
}
