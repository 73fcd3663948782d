use anyhow::Result;
use wgpu;

use super::gpu::GpuContext;
use super::pipeline::BlitPipeline;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Where the canvas lands on the surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Centre the canvas on the surface, shrinking it (aspect kept) when it does
/// not fit.
pub fn place_canvas(surface: (u32, u32), canvas: (u32, u32)) -> Placement {
    let (sw, sh) = (surface.0 as f32, surface.1 as f32);
    let (cw, ch) = (canvas.0.max(1) as f32, canvas.1.max(1) as f32);
    let scale = (sw / cw).min(sh / ch).min(1.0);
    let (width, height) = (cw * scale, ch * scale);
    Placement {
        x: ((sw - width) / 2.0).floor(),
        y: ((sh - height) / 2.0).floor(),
        width,
        height,
    }
}

struct CanvasTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// The texture in `slot`, reallocated when the canvas size changed.
fn canvas_texture<'a>(
    slot: &'a mut Option<CanvasTexture>,
    pipeline: &BlitPipeline,
    gpu: &GpuContext,
    width: u32,
    height: u32,
) -> &'a CanvasTexture {
    match slot.take() {
        Some(t) if t.width == width && t.height == height => slot.insert(t),
        _ => {
            let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("canvas_texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = pipeline.bind_group(&gpu.device, &view);
            log::debug!("Canvas texture allocated: {}x{}", width, height);
            slot.insert(CanvasTexture {
                texture,
                bind_group,
                width,
                height,
            })
        }
    }
}

/// Uploads the CPU canvas each frame and draws it centred on a black surface.
pub struct FramePresenter {
    pipeline: BlitPipeline,
    target: Option<CanvasTexture>,
}

impl FramePresenter {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pipeline: BlitPipeline::new(&gpu.device, gpu.format()),
            target: None,
        }
    }

    /// Upload `pixels` (tightly packed RGBA8, `width * height * 4` bytes) and
    /// present them.
    pub fn present(&mut self, gpu: &GpuContext, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 4 {
            anyhow::bail!(
                "Canvas buffer of {} bytes does not match {}x{}",
                pixels.len(),
                width,
                height
            );
        }

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out waiting for the next surface texture");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let canvas = canvas_texture(&mut self.target, &self.pipeline, gpu, width, height);
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &canvas.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let placement = place_canvas(gpu.size(), (width, height));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_viewport(
                placement.x,
                placement.y,
                placement.width,
                placement.height,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &canvas.bind_group, &[]);
            render_pass.draw(0..3, 0..1); // fullscreen triangle
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
