// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::error::RenderError;

/// Holds the core wgpu resources shared by every render.
/// Created once per process; if creation fails callers fall back to the CPU path.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
    /// Largest buffer the device accepts; bounds surface readback.
    pub max_buffer_size: u64,
}

impl GpuContext {
    /// Attempt to create a GPU context.  Tries hardware first, then falls
    /// back to a software rasterizer (`force_fallback_adapter`).
    ///
    /// Rendering is headless (offscreen target + readback), so no surface is
    /// needed to pick an adapter.
    pub fn new(preferred_gpu: &str) -> Result<Self, RenderError> {
        match pollster::block_on(Self::new_async(preferred_gpu, false)) {
            Err(RenderError::NoAdapter) => {
                log::warn!("hardware adapter unavailable, trying software fallback");
                pollster::block_on(Self::new_async(preferred_gpu, true))
            }
            other => other,
        }
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power_preference(preferred_gpu),
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("KernelFE GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        max_buffer_size: limits.max_buffer_size,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await?;

        log::info!(
            "GPU ready: {} (max texture {}px{})",
            adapter_name,
            limits.max_texture_dimension_2d,
            if force_fallback { ", software" } else { "" }
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
            max_buffer_size: limits.max_buffer_size,
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.  Does not wait for completion.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Map a settings string onto a wgpu power preference.
pub fn power_preference(preferred_gpu: &str) -> wgpu::PowerPreference {
    match preferred_gpu.to_lowercase().as_str() {
        "low power" | "low-power" | "integrated" => wgpu::PowerPreference::LowPower,
        "none" => wgpu::PowerPreference::None,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}
