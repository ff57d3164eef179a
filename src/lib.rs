//! KernelFE — 3×3 image convolution through a wgpu vertex + fragment shader
//! pipeline, with a CPU path that produces the same pixels.
//!
//! The render core lives in [`gpu`]: shader compilation, program linking,
//! quad geometry, texture upload and the [`ConvolutionRenderer`] that ties
//! them together.  [`cli`] is the command-line front end.

pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod io;
pub mod kernel;
pub mod logger;
pub mod ops;
pub mod request;

pub use config::RenderConfig;
pub use error::{AppError, KernelError, ProgramLinkError, RenderError, ShaderCompileError};
pub use geometry::{Layout, Rect, SurfaceSize};
pub use gpu::{ConvolutionRenderer, GpuContext, ShaderSource};
pub use kernel::{Kernel, KernelPreset};
pub use request::{RenderRequest, RenderedFrame, SourceImage};
