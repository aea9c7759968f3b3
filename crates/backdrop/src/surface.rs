//! Rendering surface seam between the tunnel loop and the GPU.

use anyhow::{anyhow, Result};
use engine_core::Viewport;
use image::RgbaImage;
use procgen::{TextureData, TunnelScene};
use renderer::{Camera, InstanceData, Renderer};

const BRICK_TINT: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// What the tunnel loop needs from whatever draws it.
pub trait RenderSurface {
    /// Install the brick texture shared by every box.
    fn set_material(&mut self, texture: &TextureData) -> Result<()>;

    fn resize(&mut self, viewport: Viewport);

    /// Draw one frame.
    fn render(&mut self, camera: &Camera, instances: &[InstanceData]) -> Result<()>;

    /// Give the surface back to the host. Nothing is drawn afterwards.
    fn release(&mut self);
}

impl RenderSurface for Renderer {
    fn set_material(&mut self, texture: &TextureData) -> Result<()> {
        let image = brick_image(texture)?;
        Renderer::set_material(self, &image);
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        Renderer::resize(self, viewport.width, viewport.height);
    }

    fn render(&mut self, camera: &Camera, instances: &[InstanceData]) -> Result<()> {
        self.update_camera(camera);
        self.render_instances(instances)?;
        Ok(())
    }

    fn release(&mut self) {
        Renderer::release(self);
    }
}

/// Copy generated texels into an `image` buffer (for upload and PNG export).
pub fn brick_image(texture: &TextureData) -> Result<RgbaImage> {
    RgbaImage::from_raw(texture.width, texture.height, texture.to_bytes()).ok_or_else(|| {
        anyhow!(
            "texture buffer does not match {}x{}",
            texture.width,
            texture.height
        )
    })
}

/// Flatten the scene graph into GPU instances.
pub fn instance_data(scene: &TunnelScene) -> Vec<InstanceData> {
    scene
        .instances()
        .into_iter()
        .map(|i| InstanceData::new(i.model.to_cols_array_2d(), i.uv_rect, BRICK_TINT))
        .collect()
}
