//! Ambient term: clears the light buffer and adds occluded ambient light to
//! every pixel covered by geometry.

use bytemuck::{Pod, Zeroable};

use crate::error::Result;
use crate::programs::ShaderProgram;
use crate::render_graph::{Draw, PassDescriptor, PassKind, Step, TargetSet};
use crate::stages::{
    FrameBinding, GroupLayout, PipelineDesc, Resource, create_pipeline, pipeline_layout,
    uniform_buffer,
};
use crate::targets::{HDR_FORMAT, TargetId};

/// Background color of the light buffer, visible wherever nothing was drawn.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.118,
    g: 0.428,
    b: 0.860,
    a: 1.0,
};

pub fn plan() -> Vec<Step> {
    let pass = PassDescriptor::new("Ambient Pass")
        .color(TargetId::LightColor, wgpu::LoadOp::Clear(CLEAR_COLOR))
        .depth_stencil(TargetId::LightDepth, wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        .draw(PassKind::AmbientLighting, Draw::FullScreen);
    vec![Step::Pass(pass)]
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct AmbientParams {
    strength: f32,
    _pad: [f32; 3],
}

pub struct AmbientLightingStage {
    pipeline: wgpu::RenderPipeline,
    frame: Option<FrameBinding>,
    group: GroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    params_buffer: wgpu::Buffer,
}

impl AmbientLightingStage {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: &ShaderProgram,
        frame_buffer: &wgpu::Buffer,
        strength: f32,
    ) -> Result<Self> {
        let frame = FrameBinding::optional(device, program, frame_buffer)?;
        let slot = program.required("g_albedo_spec")?;
        let group = GroupLayout::new(
            device,
            program,
            slot.group,
            &[
                ("g_albedo_spec", Resource::Texture),
                ("ssao_input", Resource::Texture),
                ("ambient", Resource::Uniform),
            ],
        )?;

        let params_buffer = uniform_buffer::<AmbientParams>(device, "Ambient Params");
        queue.write_buffer(
            &params_buffer,
            0,
            bytemuck::bytes_of(&AmbientParams {
                strength,
                _pad: [0.0; 3],
            }),
        );

        let module = program.create_module(device);
        let mut groups = vec![&group];
        groups.extend(frame.as_ref().map(FrameBinding::layout));
        let layout = pipeline_layout(device, program, &groups)?;
        let pipeline = create_pipeline(
            device,
            &PipelineDesc {
                label: "Ambient Pipeline",
                module: &module,
                layout: &layout,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_main",
                vertex_buffers: &[],
                color_formats: &[HDR_FORMAT],
                state: PassKind::AmbientLighting.render_state(),
            },
        );

        Ok(Self {
            pipeline,
            frame,
            group,
            bind_group: None,
            params_buffer,
        })
    }

    pub fn bind_targets(&mut self, device: &wgpu::Device, targets: &TargetSet) -> Result<()> {
        self.bind_group = Some(self.group.bind(
            device,
            "Ambient Bind Group",
            [
                wgpu::BindingResource::TextureView(targets.view(TargetId::GAlbedoSpec)?),
                wgpu::BindingResource::TextureView(targets.view(TargetId::SsaoBlur)?),
                self.params_buffer.as_entire_binding(),
            ],
        ));
        Ok(())
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
