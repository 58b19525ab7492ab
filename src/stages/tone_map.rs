//! Light buffer reduction, average color readback and the final
//! exposure-scaled tone map onto the surface.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use half::f16;

use crate::error::{RenderError, Result};
use crate::programs::ShaderProgram;
use crate::render_graph::{Draw, PassDescriptor, PassKind, Step, TargetSet};
use crate::stages::{
    FrameBinding, GroupLayout, PipelineDesc, Resource, create_pipeline, pipeline_layout,
    uniform_buffer,
};
use crate::targets::{HDR_FORMAT, TargetId};

/// Downsample the light buffer to 1x1 so its last level is the average.
pub fn reduce() -> Vec<Step> {
    vec![Step::GenerateMipmaps(TargetId::LightColor)]
}

pub fn plan() -> Vec<Step> {
    let pass = PassDescriptor::new("Tone Map Pass")
        .color(TargetId::Surface, wgpu::LoadOp::Clear(wgpu::Color::BLACK))
        .draw(PassKind::ToneMap, Draw::FullScreen);
    vec![Step::Pass(pass)]
}

/// Whether the shader must gamma-encode for a surface of `format`.
pub fn needs_gamma(format: wgpu::TextureFormat) -> bool {
    !format.is_srgb()
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ToneParams {
    pub exposure: f32,
    pub encode_gamma: u32,
    pub _pad: [f32; 2],
}

impl ToneParams {
    pub fn new(exposure: f32, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            exposure,
            encode_gamma: needs_gamma(surface_format) as u32,
            _pad: [0.0; 2],
        }
    }
}

pub struct ToneMapStage {
    pipeline: wgpu::RenderPipeline,
    frame: Option<FrameBinding>,
    group: GroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    params_buffer: wgpu::Buffer,
    surface_format: wgpu::TextureFormat,
}

impl ToneMapStage {
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        frame_buffer: &wgpu::Buffer,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let frame = FrameBinding::optional(device, program, frame_buffer)?;
        let slot = program.required("hdr_input")?;
        let group = GroupLayout::new(
            device,
            program,
            slot.group,
            &[
                ("hdr_input", Resource::Texture),
                ("tone", Resource::Uniform),
            ],
        )?;
        let params_buffer = uniform_buffer::<ToneParams>(device, "Tone Params");

        let module = program.create_module(device);
        let mut groups = vec![&group];
        groups.extend(frame.as_ref().map(FrameBinding::layout));
        let layout = pipeline_layout(device, program, &groups)?;
        let pipeline = create_pipeline(
            device,
            &PipelineDesc {
                label: "Tone Map Pipeline",
                module: &module,
                layout: &layout,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_main",
                vertex_buffers: &[],
                color_formats: &[surface_format],
                state: PassKind::ToneMap.render_state(),
            },
        );

        log::info!(
            "Tone mapping to {surface_format:?} (gamma encode: {})",
            needs_gamma(surface_format)
        );
        Ok(Self {
            pipeline,
            frame,
            group,
            bind_group: None,
            params_buffer,
            surface_format,
        })
    }

    pub fn bind_targets(&mut self, device: &wgpu::Device, targets: &TargetSet) -> Result<()> {
        self.bind_group = Some(self.group.bind(
            device,
            "Tone Map Bind Group",
            [
                wgpu::BindingResource::TextureView(targets.view(TargetId::LightColor)?),
                self.params_buffer.as_entire_binding(),
            ],
        ));
        Ok(())
    }

    pub fn set_exposure(&self, queue: &wgpu::Queue, exposure: f32) {
        let params = ToneParams::new(exposure, self.surface_format);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        if let Some(frame) = &self.frame {
            frame.set(pass);
        }
        pass.set_bind_group(self.group.group, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Row pitch of the readback copy; one texel padded to the copy alignment.
const READBACK_ROW: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Reads the coarsest mip of the light buffer back to the CPU.
pub struct AverageReadback {
    buffer: wgpu::Buffer,
}

impl AverageReadback {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Average Color Readback"),
            size: READBACK_ROW as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    /// Copy the last mip level of `texture` into the readback buffer.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        let level = texture.mip_level_count() - 1;
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(READBACK_ROW),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Block until the copy lands and decode it.
    pub fn read(&self, device: &wgpu::Device) -> Result<Vec3> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let average = decode_texel(&slice.get_mapped_range());
        self.buffer.unmap();
        average
    }
}

/// Decode one `Rgba16Float` texel.
pub fn decode_texel(bytes: &[u8]) -> Result<Vec3> {
    const TEXEL: usize = 8;
    debug_assert_eq!(HDR_FORMAT.block_copy_size(None), Some(TEXEL as u32));

    let texel = bytes.get(..TEXEL).ok_or_else(|| {
        RenderError::Readback(format!("expected {TEXEL} bytes, got {}", bytes.len()))
    })?;
    let channel =
        |i: usize| f16::from_bits(u16::from_le_bytes([texel[2 * i], texel[2 * i + 1]])).to_f32();
    Ok(Vec3::new(channel(0), channel(1), channel(2)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texel(rgba: [f32; 4]) -> Vec<u8> {
        rgba.iter()
            .flat_map(|&c| f16::from_f32(c).to_bits().to_le_bytes())
            .collect()
    }

    #[test]
    fn reduces_light_buffer_before_tone_mapping() {
        assert_eq!(reduce(), vec![Step::GenerateMipmaps(TargetId::LightColor)]);

        let steps = plan();
        let pass = steps[0].as_pass().unwrap();
        assert_eq!(pass.colors[0].target, TargetId::Surface);
        assert!(pass.depth_stencil.is_none());
        assert_eq!(pass.draws[0].kind, PassKind::ToneMap);
    }

    #[test]
    fn gamma_only_for_linear_surfaces() {
        assert!(!needs_gamma(wgpu::TextureFormat::Bgra8UnormSrgb));
        assert!(needs_gamma(wgpu::TextureFormat::Bgra8Unorm));
        let gamma = |format| ToneParams::new(1.0, format).encode_gamma;
        assert_eq!(gamma(wgpu::TextureFormat::Rgba8Unorm), 1);
        assert_eq!(gamma(wgpu::TextureFormat::Rgba8UnormSrgb), 0);
    }

    #[test]
    fn tone_params_are_one_vec4() {
        assert_eq!(std::mem::size_of::<ToneParams>(), 16);
    }

    #[test]
    fn decodes_half_float_texel() {
        let mut bytes = texel([0.5, 2.0, 0.25, 1.0]);
        bytes.resize(READBACK_ROW as usize, 0);
        assert_eq!(decode_texel(&bytes).unwrap(), Vec3::new(0.5, 2.0, 0.25));
    }

    #[test]
    fn short_readback_is_an_error() {
        assert!(matches!(
            decode_texel(&[0u8; 4]),
            Err(RenderError::Readback(_))
        ));
    }
}
