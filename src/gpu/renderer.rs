// ============================================================================
// CONVOLUTION RENDERER — per-request shader pipeline orchestration
// ============================================================================
//
// One `render` call owns every GPU object it creates (shader modules,
// pipeline, vertex buffers, texture, uniform buffer, bind groups) inside a
// `RenderSession` that is dropped when the call returns.  Only the output
// surface outlives a render.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::program::{self, Program, TEXTURE_UNIT, UNIFORM_GROUP};
use super::quad::QuadBuffers;
use super::shader::{self, ShaderStage};
use super::shaders::ShaderSource;
use super::surface::{RenderSurface, SURFACE_FORMAT};
use super::texture::SourceTexture;
use crate::error::RenderError;
use crate::geometry::{Layout, SurfaceSize};
use crate::kernel::Kernel;
use crate::request::{RenderRequest, RenderedFrame};

// ============================================================================
// UNIFORM TYPES
// ============================================================================

/// Mirrors `ConvolutionUniforms` in the WGSL: a vec2 then a mat3x3 whose
/// columns are each padded to 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ConvolutionUniforms {
    pub resolution: [f32; 2],
    pub _pad0: [f32; 2],
    pub kernel: [[f32; 4]; 3],
}

impl ConvolutionUniforms {
    pub fn new(surface: SurfaceSize, kernel: &Kernel) -> Self {
        Self {
            resolution: surface.resolution(),
            _pad0: [0.0; 2],
            kernel: kernel_columns(kernel),
        }
    }
}

/// Upload layout of `kernel`: the row-major matrix is transposed before it is
/// written column by column, so shader column `i` holds the caller's column
/// `i` (horizontal offset `i - 1`) and `kernel[i][j] == K[j][i]`.
pub fn kernel_columns(kernel: &Kernel) -> [[f32; 4]; 3] {
    let t = kernel.transposed().rows;
    [
        [t[0][0], t[0][1], t[0][2], 0.0],
        [t[1][0], t[1][1], t[1][2], 0.0],
        [t[2][0], t[2][1], t[2][2], 0.0],
    ]
}

// ============================================================================
// RENDERER
// ============================================================================

/// GPU objects created for a single render and released together.
struct RenderSession {
    program: Program,
    quad: QuadBuffers,
    source: SourceTexture,
    /// Owned here so it is released with the rest of the session.
    _uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

pub struct ConvolutionRenderer {
    pub ctx: GpuContext,
    shaders: ShaderSource,
    surface: Option<RenderSurface>,
    /// The surface holds the result of the last `render` call.
    frame_ready: bool,
    draws_issued: u64,
}

impl ConvolutionRenderer {
    pub fn new(ctx: GpuContext) -> Self {
        Self::with_shaders(ctx, ShaderSource::CONVOLUTION)
    }

    /// Renderer using a different program (diagnostics, tests).
    pub fn with_shaders(ctx: GpuContext, shaders: ShaderSource) -> Self {
        Self { ctx, shaders, surface: None, frame_ready: false, draws_issued: 0 }
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Number of draw calls submitted since creation.
    pub fn draws_issued(&self) -> u64 {
        self.draws_issued
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.surface.as_ref().map(|s| s.size)
    }

    /// Convolve `request.image` with `request.kernel` into the surface.
    ///
    /// Submits the draw and returns without waiting for the GPU.  Compile or
    /// link failures are logged and returned before anything is drawn.
    pub fn render(&mut self, request: &RenderRequest, layout: &Layout) -> Result<(), RenderError> {
        // Whatever the surface holds now is stale until this call succeeds.
        self.frame_ready = false;

        // 1. Surface at display size; the viewport covers all of it.
        RenderSurface::resize_to(&mut self.surface, &self.ctx, layout.surface)?;

        // 2–5. Per-call GPU objects.
        let session = self.build_session(request, layout).inspect_err(|e| {
            log::error!("render aborted: {e}");
        })?;

        let Some(surface) = self.surface.as_ref() else {
            return Err(RenderError::NothingRendered);
        };
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("convolution_encoder"),
        });
        {
            // 6. Clear to transparent black.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("convolution_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let SurfaceSize { width, height } = surface.size;
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

            // 7. Program + vertex state.
            pass.set_pipeline(&session.program.pipeline);
            session.quad.bind(&mut pass);

            // 8. Texture unit 0 and the uniform block.
            pass.set_bind_group(TEXTURE_UNIT, &session.source.bind_group, &[]);
            pass.set_bind_group(UNIFORM_GROUP, &session.uniform_bind_group, &[]);

            // 9. Two triangles.
            pass.draw(0..session.quad.vertex_count, 0..1);
        }
        self.ctx.submit_one(encoder);

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("draw rejected by device: {err}");
            return Err(RenderError::Device(err.to_string()));
        }

        self.draws_issued += 1;
        self.frame_ready = true;
        log::debug!(
            "drew {}x{} image into {:?} on {}x{} surface",
            request.image.width,
            request.image.height,
            layout.rect,
            layout.surface.width,
            layout.surface.height
        );
        Ok(())
    }

    /// Read the surface back to the CPU, waiting for outstanding work.
    /// Fails with `NothingRendered` unless the last `render` succeeded.
    pub fn read_pixels(&mut self) -> Result<RenderedFrame, RenderError> {
        if !self.frame_ready {
            return Err(RenderError::NothingRendered);
        }
        let surface = self.surface.as_mut().ok_or(RenderError::NothingRendered)?;
        surface.read_pixels(&self.ctx)
    }

    /// `render` followed by `read_pixels`.
    pub fn render_to_frame(
        &mut self,
        request: &RenderRequest,
        layout: &Layout,
    ) -> Result<RenderedFrame, RenderError> {
        self.render(request, layout)?;
        self.read_pixels()
    }

    fn build_session(
        &self,
        request: &RenderRequest,
        layout: &Layout,
    ) -> Result<RenderSession, RenderError> {
        let device = &self.ctx.device;

        let vertex = shader::compile(device, ShaderStage::Vertex, self.shaders.vertex)?;
        let fragment = shader::compile(device, ShaderStage::Fragment, self.shaders.fragment)?;
        let program = program::link(&self.ctx, &vertex, &fragment, SURFACE_FORMAT)?;

        let quad = QuadBuffers::new(device, &layout.rect);
        let source = SourceTexture::upload(&self.ctx, &program.texture_layout, &request.image)?;

        let uniforms = ConvolutionUniforms::new(layout.surface, &request.kernel);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("convolution_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("convolution_uniform_bg"),
            layout: &program.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(RenderSession {
            program,
            quad,
            source,
            _uniform_buffer: uniform_buffer,
            uniform_bind_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_64_bytes() {
        assert_eq!(std::mem::size_of::<ConvolutionUniforms>(), 64);
        let u = ConvolutionUniforms::new(SurfaceSize::new(800, 650), &Kernel::IDENTITY);
        assert_eq!(u.resolution, [800.0, 650.0]);
    }

    #[test]
    fn columns_hold_horizontal_offsets() {
        // Left neighbour only: row 1 (dy = 0), column 0 (dx = -1).
        let k = Kernel::from_slice(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let cols = kernel_columns(&k);
        // Shader reads kernel[i][j] with i = dx + 1, j = dy + 1.
        assert_eq!(cols[0][1], 1.0);
        assert_eq!(cols[1][0], 0.0);
        for (i, col) in cols.iter().enumerate() {
            for j in 0..3 {
                assert_eq!(col[j], k.weight_at(i as i32 - 1, j as i32 - 1));
            }
            assert_eq!(col[3], 0.0);
        }
    }
}
