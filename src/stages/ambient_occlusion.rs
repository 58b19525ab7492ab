//! Screen-space ambient occlusion.
//!
//! Pass one samples a hemisphere kernel around each covered pixel and writes
//! the unoccluded fraction. Pass two box-blurs it into the target the ambient
//! pass reads. With the stage off, the blurred target is simply cleared to 1
//! so ambient lighting is unattenuated.

use crate::config::SsaoSettings;
use crate::error::Result;
use crate::programs::ShaderProgram;
use crate::render_graph::{Draw, PassDescriptor, PassKind, Step, TargetSet};
use crate::ssao_kernel::{KERNEL_SIZE, NOISE_DIM, SsaoKernel};
use crate::stages::{
    FrameBinding, GroupLayout, PipelineDesc, Resource, create_pipeline, pipeline_layout,
    uniform_buffer,
};
use crate::targets::TargetId;

const UNOCCLUDED: wgpu::Color = wgpu::Color::WHITE;

pub fn plan(enabled: bool) -> Vec<Step> {
    if !enabled {
        let clear = PassDescriptor::new("SSAO Clear")
            .color(TargetId::SsaoBlur, wgpu::LoadOp::Clear(UNOCCLUDED));
        return vec![Step::Pass(clear)];
    }

    let sample = PassDescriptor::new("SSAO Pass")
        .color(TargetId::SsaoColor, wgpu::LoadOp::Clear(UNOCCLUDED))
        .depth_stencil(TargetId::SsaoDepth, wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        .draw(PassKind::SsaoSample, Draw::FullScreen);
    let blur = PassDescriptor::new("SSAO Blur Pass")
        .color(TargetId::SsaoBlur, wgpu::LoadOp::Clear(UNOCCLUDED))
        .draw(PassKind::SsaoBlur, Draw::FullScreen);
    vec![Step::Pass(sample), Step::Pass(blur)]
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SsaoParams {
    pub samples: [[f32; 4]; KERNEL_SIZE],
    pub radius: f32,
    pub bias: f32,
    pub _pad: [f32; 2],
}

impl SsaoParams {
    pub fn new(kernel: &SsaoKernel, settings: &SsaoSettings) -> Self {
        let mut samples = [[0.0; 4]; KERNEL_SIZE];
        for (slot, sample) in samples.iter_mut().zip(&kernel.samples) {
            *slot = *sample;
        }
        Self {
            samples,
            radius: settings.radius,
            bias: settings.bias,
            _pad: [0.0; 2],
        }
    }
}

pub struct AmbientOcclusionStage {
    sample_pipeline: wgpu::RenderPipeline,
    sample_frame: FrameBinding,
    sample_group: GroupLayout,
    sample_bind_group: Option<wgpu::BindGroup>,
    blur_pipeline: wgpu::RenderPipeline,
    blur_frame: Option<FrameBinding>,
    blur_group: GroupLayout,
    blur_bind_group: Option<wgpu::BindGroup>,
    params_buffer: wgpu::Buffer,
    noise_view: wgpu::TextureView,
}

impl AmbientOcclusionStage {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        sample_program: &ShaderProgram,
        blur_program: &ShaderProgram,
        frame_buffer: &wgpu::Buffer,
        settings: &SsaoSettings,
    ) -> Result<Self> {
        let kernel = SsaoKernel::generate(settings.seed);

        let params_buffer = uniform_buffer::<SsaoParams>(device, "SSAO Params");
        queue.write_buffer(
            &params_buffer,
            0,
            bytemuck::bytes_of(&SsaoParams::new(&kernel, settings)),
        );
        let noise_view = upload_noise(device, queue, &kernel);

        // Sampling
        let sample_frame = FrameBinding::required(device, sample_program, frame_buffer)?;
        let sample_slot = sample_program.required("g_position")?;
        let sample_group = GroupLayout::new(
            device,
            sample_program,
            sample_slot.group,
            &[
                ("g_position", Resource::Texture),
                ("g_normal", Resource::Texture),
                ("noise_tex", Resource::Texture),
                ("ssao", Resource::Uniform),
            ],
        )?;
        let module = sample_program.create_module(device);
        let layout = pipeline_layout(
            device,
            sample_program,
            &[sample_frame.layout(), &sample_group],
        )?;
        let ao_format = TargetId::SsaoColor
            .format()
            .unwrap_or(wgpu::TextureFormat::R16Float);
        let sample_pipeline = create_pipeline(
            device,
            &PipelineDesc {
                label: "SSAO Pipeline",
                module: &module,
                layout: &layout,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_main",
                vertex_buffers: &[],
                color_formats: &[ao_format],
                state: PassKind::SsaoSample.render_state(),
            },
        );

        // Blur
        let blur_frame = FrameBinding::optional(device, blur_program, frame_buffer)?;
        let blur_slot = blur_program.required("ssao_input")?;
        let blur_group = GroupLayout::new(
            device,
            blur_program,
            blur_slot.group,
            &[("ssao_input", Resource::Texture)],
        )?;
        let module = blur_program.create_module(device);
        let mut groups = vec![&blur_group];
        groups.extend(blur_frame.as_ref().map(FrameBinding::layout));
        let layout = pipeline_layout(device, blur_program, &groups)?;
        let blur_pipeline = create_pipeline(
            device,
            &PipelineDesc {
                label: "SSAO Blur Pipeline",
                module: &module,
                layout: &layout,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_main",
                vertex_buffers: &[],
                color_formats: &[ao_format],
                state: PassKind::SsaoBlur.render_state(),
            },
        );

        Ok(Self {
            sample_pipeline,
            sample_frame,
            sample_group,
            sample_bind_group: None,
            blur_pipeline,
            blur_frame,
            blur_group,
            blur_bind_group: None,
            params_buffer,
            noise_view,
        })
    }

    /// Point the bind groups at a freshly created target set.
    pub fn bind_targets(&mut self, device: &wgpu::Device, targets: &TargetSet) -> Result<()> {
        self.sample_bind_group = Some(self.sample_group.bind(
            device,
            "SSAO Bind Group",
            [
                wgpu::BindingResource::TextureView(targets.view(TargetId::GPosition)?),
                wgpu::BindingResource::TextureView(targets.view(TargetId::GNormal)?),
                wgpu::BindingResource::TextureView(&self.noise_view),
                self.params_buffer.as_entire_binding(),
            ],
        ));
        self.blur_bind_group = Some(self.blur_group.bind(
            device,
            "SSAO Blur Bind Group",
            [wgpu::BindingResource::TextureView(
                targets.view(TargetId::SsaoColor)?,
            )],
        ));
        Ok(())
    }

    pub fn draw_sample(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(bind_group) = &self.sample_bind_group else {
            return;
        };
        pass.set_pipeline(&self.sample_pipeline);
        self.sample_frame.set(pass);
        pass.set_bind_group(self.sample_group.group, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn draw_blur(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(bind_group) = &self.blur_bind_group else {
            return;
        };
        pass.set_pipeline(&self.blur_pipeline);
        if let Some(frame) = &self.blur_frame {
            frame.set(pass);
        }
        pass.set_bind_group(self.blur_group.group, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn upload_noise(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    kernel: &SsaoKernel,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: NOISE_DIM,
        height: NOISE_DIM,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("SSAO Noise"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&kernel.noise),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(NOISE_DIM * 16),
            rows_per_image: Some(NOISE_DIM),
        },
        size,
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use glam::{Mat3, Vec3};

    use super::*;
    use crate::ssao_kernel::NOISE_SIZE;

    /// View-space point shaded by the occlusion tests.
    const SURFACE: Vec3 = Vec3::new(0.0, 0.0, -5.0);

    fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
        let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// Occlusion for one pixel, with the scene given as view-space depth at a
    /// view-space point. Must mirror `ssao_sample.wgsl`.
    fn occlusion(
        kernel: &SsaoKernel,
        settings: &SsaoSettings,
        frag_pos: Vec3,
        normal: Vec3,
        noise_index: usize,
        scene_depth: impl Fn(Vec3) -> f32,
    ) -> f32 {
        let random = Vec3::from_slice(&kernel.noise[noise_index][..3]).normalize();
        let tangent = (random - normal * random.dot(normal)).normalize();
        let bitangent = normal.cross(tangent);
        let tbn = Mat3::from_cols(tangent, bitangent, normal);

        let mut occluded = 0.0;
        for sample in &kernel.samples {
            let sample_pos = frag_pos + tbn * Vec3::from_slice(&sample[..3]) * settings.radius;
            let depth = scene_depth(sample_pos);
            let range = smoothstep(0.0, 1.0, settings.radius / (frag_pos.z - depth).abs());
            if depth >= sample_pos.z + settings.bias {
                occluded += range;
            }
        }
        1.0 - occluded / KERNEL_SIZE as f32
    }

    /// One texel of the blur pass. Must mirror `ssao_blur.wgsl`: a 4x4 box
    /// from -2 to +1 with coordinates clamped to the image.
    fn blur(image: &[Vec<f32>], x: i32, y: i32) -> f32 {
        let last_y = image.len() as i32 - 1;
        let last_x = image[0].len() as i32 - 1;
        let mut total = 0.0;
        for dx in -2..2 {
            for dy in -2..2 {
                let tx = (x + dx).clamp(0, last_x) as usize;
                let ty = (y + dy).clamp(0, last_y) as usize;
                total += image[ty][tx];
            }
        }
        total / 16.0
    }

    #[test]
    fn blur_cancels_the_noise_tile() {
        let tile: Vec<f32> = (0..NOISE_SIZE)
            .map(|i| ((i * 7) % 16) as f32 / 15.0)
            .collect();
        let mean = tile.iter().sum::<f32>() / NOISE_SIZE as f32;
        // the raw occlusion repeats the 4x4 noise tile across the screen
        let image: Vec<Vec<f32>> = (0..12)
            .map(|y| (0..12).map(|x| tile[(y % 4) * 4 + x % 4]).collect())
            .collect();
        for y in 2..11 {
            for x in 2..11 {
                let ao = blur(&image, x, y);
                assert!((ao - mean).abs() < 1e-5, "({x}, {y}) = {ao}");
            }
        }
    }

    #[test]
    fn blur_clamps_at_the_edges() {
        let checker: Vec<Vec<f32>> = (0..8)
            .map(|y| (0..8).map(|x| ((x + y) % 2) as f32).collect())
            .collect();
        assert!((blur(&checker, 4, 4) - 0.5).abs() < 1e-6);
        // the corner window reads texel 0 three times along each axis
        assert!((blur(&checker, 0, 0) - 0.375).abs() < 1e-6);

        let flat = vec![vec![0.25; 5]; 5];
        for (x, y) in [(0, 0), (4, 0), (0, 4), (4, 4), (2, 2)] {
            assert!((blur(&flat, x, y) - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn disabled_stage_clears_blur_to_unoccluded() {
        let steps = plan(false);
        assert_eq!(steps.len(), 1);
        let pass = steps[0].as_pass().unwrap();
        assert!(pass.draws.is_empty());
        assert!(pass.depth_stencil.is_none());
        assert_eq!(pass.colors.len(), 1);
        assert_eq!(pass.colors[0].target, TargetId::SsaoBlur);
        assert_eq!(pass.colors[0].load, wgpu::LoadOp::Clear(wgpu::Color::WHITE));
    }

    #[test]
    fn enabled_stage_samples_then_blurs() {
        let steps = plan(true);
        assert_eq!(steps.len(), 2);

        let sample = steps[0].as_pass().unwrap();
        assert_eq!(sample.colors[0].target, TargetId::SsaoColor);
        assert_eq!(
            sample.colors[0].load,
            wgpu::LoadOp::Clear(wgpu::Color::WHITE)
        );
        let depth = sample.depth_stencil.unwrap();
        assert_eq!(depth.target, TargetId::SsaoDepth);
        assert_eq!(depth.depth_load, wgpu::LoadOp::Load);
        assert_eq!(sample.draws[0].kind, PassKind::SsaoSample);

        let blur = steps[1].as_pass().unwrap();
        assert_eq!(blur.colors[0].target, TargetId::SsaoBlur);
        assert!(matches!(blur.colors[0].load, wgpu::LoadOp::Clear(_)));
        assert_eq!(blur.draws[0].kind, PassKind::SsaoBlur);
    }

    #[test]
    fn params_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<SsaoParams>(), 64 * 16 + 16);
        let settings = SsaoSettings::default();
        let kernel = SsaoKernel::generate(settings.seed);
        let params = SsaoParams::new(&kernel, &settings);
        assert_eq!(params.samples[10], kernel.samples[10]);
        assert_eq!(params.radius, 0.5);
        assert_eq!(params.bias, 0.025);
    }

    #[test]
    fn exposed_surface_keeps_full_ambient() {
        let settings = SsaoSettings::default();
        let kernel = SsaoKernel::generate(settings.seed);
        // a wall facing the camera five units away, nothing in front of it
        let wall = |_: Vec3| -5.0;
        for noise in 0..NOISE_SIZE {
            let ao = occlusion(&kernel, &settings, SURFACE, Vec3::Z, noise, wall);
            assert_eq!(ao, 1.0);
        }
    }

    #[test]
    fn covered_surface_is_occluded() {
        let settings = SsaoSettings::default();
        let kernel = SsaoKernel::generate(settings.seed);
        // an occluder one unit in front of the shaded point everywhere
        let occluder = |_: Vec3| -4.0;
        let ao = occlusion(&kernel, &settings, SURFACE, Vec3::Z, 0, occluder);
        // every sample occluded, each weighted by smoothstep(0.5) = 0.5
        assert!((ao - 0.5).abs() < 1e-5, "ao = {ao}");
    }
}
