// ============================================================================
// PROGRAM LINKER — vertex + fragment modules → render pipeline
// ============================================================================

use std::fmt::Write as _;

use super::context::GpuContext;
use super::quad::QuadBuffers;
use super::shader::{CompiledShader, ShaderStage, StageInterface};
use super::texture::source_texture_bind_group_layout;
use crate::error::ProgramLinkError;

/// Bind group index of the source texture + sampler ("texture unit 0").
pub const TEXTURE_UNIT: u32 = 0;
/// Bind group index of the convolution uniform block.
pub const UNIFORM_GROUP: u32 = 1;

/// A linked, executable program plus the layouts its bind groups must match.
pub struct Program {
    pub pipeline: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    pub uniform_layout: wgpu::BindGroupLayout,
}

/// Check that every fragment input slot is written by the vertex stage with
/// the same type.  Vertex outputs the fragment ignores are allowed.
pub fn check_stage_interface(
    vertex: &StageInterface,
    fragment: &StageInterface,
) -> Result<(), ProgramLinkError> {
    let mut log = String::new();
    for (location, ty) in &fragment.locations {
        match vertex.locations.get(location) {
            None => {
                let _ = writeln!(
                    log,
                    "fragment input @location({location}) is not written by the vertex stage"
                );
            }
            Some(vty) if vty != ty => {
                let _ = writeln!(
                    log,
                    "@location({location}) type mismatch: vertex writes {vty:?}, fragment reads {ty:?}"
                );
            }
            Some(_) => {}
        }
    }
    if log.is_empty() {
        Ok(())
    } else {
        Err(ProgramLinkError { log })
    }
}

/// Link two compiled shaders into a pipeline drawing into `target_format`.
pub fn link(
    ctx: &GpuContext,
    vertex: &CompiledShader,
    fragment: &CompiledShader,
    target_format: wgpu::TextureFormat,
) -> Result<Program, ProgramLinkError> {
    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err(ProgramLinkError {
            log: format!(
                "expected a vertex + fragment pair, got {} + {}",
                vertex.stage, fragment.stage
            ),
        });
    }
    check_stage_interface(&vertex.interface, &fragment.interface)?;

    let device = &ctx.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let texture_layout = source_texture_bind_group_layout(device);
    let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("convolution_uniform_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    // Group order must follow TEXTURE_UNIT / UNIFORM_GROUP.
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("convolution_pipeline_layout"),
        bind_group_layouts: &[&texture_layout, &uniform_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("convolution_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &vertex.module,
            entry_point: &vertex.entry_point,
            buffers: &QuadBuffers::layouts(),
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment.module,
            entry_point: &fragment.entry_point,
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None, // output alpha is always 1
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ProgramLinkError { log: err.to_string() });
    }

    Ok(Program { pipeline, texture_layout, uniform_layout })
}
