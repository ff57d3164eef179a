// ============================================================================
// SHADER COMPILER — WGSL → validated naga IR → wgpu::ShaderModule
// ============================================================================
//
// Compilation runs the naga front end and validator ourselves instead of
// handing WGSL straight to wgpu, so diagnostics come back as text attached
// to a `ShaderCompileError` rather than as an uncaptured device error.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ShaderCompileError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "convolution_vertex_shader",
            ShaderStage::Fragment => "convolution_fragment_shader",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// User-defined `@location` slots crossing the vertex → fragment boundary.
/// Vertex shaders record their outputs, fragment shaders their inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageInterface {
    pub locations: BTreeMap<u32, naga::TypeInner>,
}

/// Front-end result, before any GPU object exists.
#[derive(Debug)]
pub struct ShaderIr {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub interface: StageInterface,
    pub module: naga::Module,
}

/// A shader module ready to be linked.
#[derive(Debug)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub interface: StageInterface,
    pub module: wgpu::ShaderModule,
}

/// Parse + validate `source` and locate its `stage` entry point.
pub fn validate(stage: ShaderStage, source: &str) -> Result<ShaderIr, ShaderCompileError> {
    let fail = |log: String| ShaderCompileError { stage, log };

    let module = naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator
        .validate(&module)
        .map_err(|e| fail(e.emit_to_string(source)))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga_stage())
        .ok_or_else(|| fail(format!("no @{stage} entry point in module")))?;

    let mut interface = StageInterface::default();
    match stage {
        ShaderStage::Vertex => {
            if let Some(result) = &entry.function.result {
                collect_locations(&module, result.ty, result.binding.as_ref(), &mut interface);
            }
        }
        ShaderStage::Fragment => {
            for arg in &entry.function.arguments {
                collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut interface);
            }
        }
    }

    let entry_point = entry.name.clone();
    Ok(ShaderIr { stage, entry_point, interface, module })
}

/// Compile `source` into a GPU shader module for `stage`.
pub fn compile(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &str,
) -> Result<CompiledShader, ShaderCompileError> {
    let ShaderIr { stage, entry_point, interface, module } = validate(stage, source)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(stage.label()),
        source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderCompileError { stage, log: err.to_string() });
    }

    Ok(CompiledShader { stage, entry_point, interface, module })
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut StageInterface,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.locations.insert(*location, module.types[ty].inner.clone());
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        out.locations.insert(*location, module.types[member.ty].inner.clone());
                    }
                }
            }
        }
    }
}
