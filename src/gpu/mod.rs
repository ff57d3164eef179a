// ============================================================================
// GPU MODULE — wgpu convolution pipeline for KernelFE
// ============================================================================
//
// Architecture:
//   context.rs  — wgpu Device, Queue, adapter init
//   shaders.rs  — WGSL source for the vertex + fragment stages (inline strings)
//   shader.rs   — shader compiler (naga front end → wgpu module)
//   program.rs  — program linker (stage interface check → render pipeline)
//   quad.rs     — position / tex-coord vertex buffers for the target rect
//   texture.rs  — source image upload, clamp-to-edge nearest sampler
//   surface.rs  — offscreen render target + readback
//   renderer.rs — ConvolutionRenderer, the per-request coordinator
// ============================================================================

pub mod context;
pub mod program;
pub mod quad;
pub mod renderer;
pub mod shader;
pub mod shaders;
pub mod surface;
pub mod texture;

pub use context::GpuContext;
pub use renderer::ConvolutionRenderer;
pub use shaders::ShaderSource;
