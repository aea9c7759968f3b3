//! Main renderer managing wgpu state and drawing the tunnel.

use crate::{
    camera::{Camera, CameraUniform},
    mesh::Mesh,
    pipeline::{
        create_camera_bind_group_layout, create_texture_bind_group,
        create_texture_bind_group_layout, create_tunnel_pipeline,
    },
    texture::{DepthTexture, Texture},
    vertex::InstanceData,
};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Instance capacity allocated up front; grows on demand.
const INITIAL_MAX_INSTANCES: u32 = 4096;

/// Failures while acquiring or driving the rendering surface.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("failed to create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("GPU out of memory")]
    OutOfMemory,
}

/// Main renderer state.
pub struct Renderer {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub window: Arc<Window>,

    tunnel_pipeline: wgpu::RenderPipeline,

    camera_bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,
    camera_uniform: CameraUniform,

    texture_bind_group_layout: wgpu::BindGroupLayout,
    material_bind_group: wgpu::BindGroup,

    depth_texture: DepthTexture,

    instance_buffer: wgpu::Buffer,
    max_instances: u32,

    box_mesh: Mesh,
    clear_color: wgpu::Color,
    released: bool,
}

impl Renderer {
    /// Create a new renderer for the given window.
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RendererError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        // A background effect does not need the discrete GPU.
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RendererError::NoSurfaceFormat)?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group_layout = create_camera_bind_group_layout(&device);
        let texture_bind_group_layout = create_texture_bind_group_layout(&device);

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // White until the brick material arrives.
        let default_texture = Texture::white_pixel(&device, &queue);
        let material_bind_group = create_texture_bind_group(
            &device,
            &texture_bind_group_layout,
            &default_texture,
            "Default Texture Bind Group",
        );

        let tunnel_pipeline = create_tunnel_pipeline(
            &device,
            &config,
            &camera_bind_group_layout,
            &texture_bind_group_layout,
        );

        let depth_texture =
            DepthTexture::new(&device, config.width, config.height, "Depth Texture");

        let max_instances = INITIAL_MAX_INSTANCES;
        let instance_buffer = create_instance_buffer(&device, max_instances);

        let box_mesh = Mesh::cube(&device);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            window,
            tunnel_pipeline,
            camera_bind_group,
            camera_buffer,
            camera_uniform,
            texture_bind_group_layout,
            material_bind_group,
            depth_texture,
            instance_buffer,
            max_instances,
            box_mesh,
            clear_color: wgpu::Color::BLACK,
            released: false,
        })
    }

    /// Replace the brick material.
    pub fn set_material(&mut self, image: &image::RgbaImage) {
        let texture = Texture::from_image(&self.device, &self.queue, image, "Brick Texture");
        self.material_bind_group = create_texture_bind_group(
            &self.device,
            &self.texture_bind_group_layout,
            &texture,
            "Brick Texture Bind Group",
        );
    }

    /// Distance fade. The clear colour follows the fog colour so the far end dissolves.
    pub fn set_fog(&mut self, start: f32, end: f32, color: [f32; 3]) {
        self.camera_uniform.fog = [start, end, 0.0, 0.0];
        self.camera_uniform.fog_color = [color[0], color[1], color[2], 1.0];
        self.clear_color = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: 1.0,
        };
    }

    /// Handle window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && !self.released {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = DepthTexture::new(
                &self.device,
                self.config.width,
                self.config.height,
                "Depth Texture",
            );
        }
    }

    /// Update camera uniform.
    pub fn update_camera(&mut self, camera: &Camera) {
        self.camera_uniform.update(camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
    }

    /// Draw one frame of brick instances and present it.
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped.
    pub fn render_instances(&mut self, instances: &[InstanceData]) -> Result<(), RendererError> {
        if self.released {
            return Ok(());
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RendererError::OutOfMemory),
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return Ok(());
            }
        };

        self.ensure_instance_capacity(instances.len() as u32);
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(instances));
        }

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Tunnel Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if !instances.is_empty() {
                render_pass.set_pipeline(&self.tunnel_pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_bind_group(1, &self.material_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.box_mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                render_pass.set_index_buffer(
                    self.box_mesh.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(
                    0..self.box_mesh.num_indices,
                    0,
                    0..instances.len() as u32,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Detach from the window: stop drawing and hide it. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.window.set_visible(false);
            log::debug!("Renderer released");
        }
    }

    fn ensure_instance_capacity(&mut self, needed: u32) {
        if needed > self.max_instances {
            self.max_instances = needed.next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.max_instances);
            log::debug!("Instance buffer grown to {}", self.max_instances);
        }
    }
}

fn create_instance_buffer(device: &wgpu::Device, max_instances: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (std::mem::size_of::<InstanceData>() * max_instances as usize) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
