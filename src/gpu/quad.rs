// ============================================================================
// QUAD BUFFERS — position + tex-coord vertex buffers for one rectangle
// ============================================================================
//
// wgpu has no vertex-array object; the equivalent state is the pair of
// `VertexBufferLayout`s baked into the pipeline plus the buffers bound with
// `set_vertex_buffer` at draw time.

use wgpu::util::DeviceExt;

use crate::geometry::{quad_tex_coords, quad_vertices, Rect};

static POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
static TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

/// Tightly packed vec2<f32>.
const VEC2_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;

pub struct QuadBuffers {
    pub positions: wgpu::Buffer,
    pub tex_coords: wgpu::Buffer,
    pub vertex_count: u32,
}

impl QuadBuffers {
    pub fn new(device: &wgpu::Device, rect: &Rect) -> Self {
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_positions"),
            contents: bytemuck::cast_slice(&quad_vertices(rect)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_tex_coords"),
            contents: bytemuck::cast_slice(&quad_tex_coords()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { positions, tex_coords, vertex_count: 6 }
    }

    /// Slot 0 = positions (`@location(0)`), slot 1 = tex coords (`@location(1)`).
    pub fn layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
        [
            wgpu::VertexBufferLayout {
                array_stride: VEC2_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: VEC2_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &TEX_COORD_ATTRIBUTES,
            },
        ]
    }

    pub fn bind<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.positions.slice(..));
        pass.set_vertex_buffer(1, self.tex_coords.slice(..));
    }
}
