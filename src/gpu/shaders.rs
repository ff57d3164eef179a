// ============================================================================
// GPU SHADERS — WGSL source for the convolution program, kept inline
// ============================================================================
//
// The two stages are separate modules so each can be compiled (and fail) on
// its own.  Both declare the same uniform block at @group(1) @binding(0):
//
//   resolution : vec2<f32>   offset  0
//   kernel     : mat3x3<f32> offset 16  (three vec4-aligned columns)
//
// The source texture + sampler live at @group(0) (texture unit 0).

/// Pair of shader sources that together form one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

impl ShaderSource {
    pub const CONVOLUTION: ShaderSource = ShaderSource {
        vertex: CONVOLUTION_VERTEX_SHADER,
        fragment: CONVOLUTION_FRAGMENT_SHADER,
    };
}

impl Default for ShaderSource {
    fn default() -> Self {
        Self::CONVOLUTION
    }
}

// ============================================================================
// VERTEX STAGE — pixel space → clip space, Y flipped
// ============================================================================
pub const CONVOLUTION_VERTEX_SHADER: &str = r#"
struct ConvolutionUniforms {
    resolution: vec2<f32>,
    kernel: mat3x3<f32>,
};

@group(1) @binding(0) var<uniform> u: ConvolutionUniforms;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let zero_to_one = in.position / u.resolution;
    let zero_to_two = zero_to_one * 2.0;
    let clip_space = zero_to_two - 1.0;

    var out: VertexOutput;
    out.clip_position = vec4<f32>(clip_space * vec2<f32>(1.0, -1.0), 0.0, 1.0);
    out.tex_coord = in.tex_coord;
    return out;
}
"#;

// ============================================================================
// FRAGMENT STAGE — 3×3 weighted sum of neighbouring texels, alpha forced to 1
// ============================================================================
//
// kernel[i][j] is column i, row j: i walks the horizontal offset, j the
// vertical one.  The host uploads the caller's row-major kernel transposed,
// so kernel[i][j] == K[j][i].
pub const CONVOLUTION_FRAGMENT_SHADER: &str = r#"
struct ConvolutionUniforms {
    resolution: vec2<f32>,
    kernel: mat3x3<f32>,
};

@group(0) @binding(0) var u_image: texture_2d<f32>;
@group(0) @binding(1) var u_sampler: sampler;
@group(1) @binding(0) var<uniform> u: ConvolutionUniforms;

struct FragmentInput {
    @location(0) tex_coord: vec2<f32>,
};

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    let one_pixel = vec2<f32>(1.0, 1.0) / vec2<f32>(textureDimensions(u_image, 0));
    var color_sum = vec4<f32>(0.0);

    for (var i = 0; i < 3; i++) {
        for (var j = 0; j < 3; j++) {
            let sample_position = in.tex_coord + vec2<f32>(f32(i - 1), f32(j - 1)) * one_pixel;
            let sample_color = textureSampleLevel(u_image, u_sampler, sample_position, 0.0);
            color_sum += sample_color * u.kernel[i][j];
        }
    }

    return vec4<f32>(color_sum.rgb, 1.0);
}
"#;
