use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::PipelineError;
use crate::renderer::texture::GpuTexture;
use crate::settings::RenderSettings;

/// Surface, device and the main depth buffer for one window.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub depth: GpuTexture,
    /// Sampled textures a single shader stage may bind.
    pub max_texture_units: u32,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, PipelineError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        log::info!("Surface created successfully!");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info());
        log::info!("Using backend: {:?}", adapter.get_info().backend);
        let adapter_features = adapter.features();

        // shadow maps are bound as one binding_array per draw
        let mut required_features = wgpu::Features::TEXTURE_BINDING_ARRAY;
        if !adapter_features.contains(required_features) {
            return Err(PipelineError::MissingFeatures(
                required_features - adapter_features,
            ));
        }
        if adapter_features
            .contains(wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING)
        {
            required_features |=
                wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING;
        }

        let adapter_limits = adapter.limits();
        let limits = wgpu::Limits {
            max_binding_array_elements_per_shader_stage: adapter_limits
                .max_binding_array_elements_per_shader_stage
                .min(256),
            max_sampled_textures_per_shader_stage: adapter_limits
                .max_sampled_textures_per_shader_stage,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features,
                required_limits: limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);

        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);

        let present_mode = settings.present_mode(&surface_caps.present_modes);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth = GpuTexture::depth(&device, "Surface depth", size.width, size.height);
        let max_texture_units = limits.max_sampled_textures_per_shader_stage;
        log::info!(
            "Surface {:?} {}x{}, {} texture units per stage",
            format,
            config.width,
            config.height,
            max_texture_units
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            depth,
            max_texture_units,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = GpuTexture::depth(&self.device, "Surface depth", new_size.width, new_size.height);
    }

    /// Re-applies the current configuration after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}
