//! Stencil-tested light volumes.
//!
//! Each light gets its own render pass over the light buffer. The pass loads
//! scene depth and clears the stencil, then draws the light's proxy sphere
//! twice:
//!
//! 1. **Mark** the front faces with color writes off. Where a front face is
//!    hidden behind scene geometry the stencil is incremented, so those
//!    pixels have their surface in front of the volume.
//! 2. **Shade** the back faces where the stencil is still zero and the back
//!    face lies at or behind the surface. What remains are pixels whose
//!    surface lies inside the volume; they receive the light additively.
//!
//! The tests evaluate the same two draws for a single pixel on the CPU.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::error::Result;
use crate::light::{LightId, LightManager, VOLUME_RINGS, VOLUME_SEGMENTS};
use crate::mesh::{Mesh, MeshData, Vertex3d};
use crate::programs::ShaderProgram;
use crate::render_graph::{Draw, PassDescriptor, PassKind, Step, TargetSet};
use crate::stages::{
    DynamicUniforms, FrameBinding, GroupLayout, PipelineDesc, Resource, create_pipeline,
    pipeline_layout,
};
use crate::targets::{HDR_FORMAT, TargetId};

/// Passes for every visible light, with counts for frame statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumePlan {
    pub steps: Vec<Step>,
    pub drawn: usize,
    pub skipped: usize,
}

pub fn light_pass(id: LightId) -> PassDescriptor {
    PassDescriptor::new("Light Volume Pass")
        .color(TargetId::LightColor, wgpu::LoadOp::Load)
        .depth_stencil(
            TargetId::LightDepth,
            wgpu::LoadOp::Load,
            wgpu::LoadOp::Clear(0),
        )
        .draw(PassKind::LightMark, Draw::LightVolume(id))
        .draw(PassKind::LightShade, Draw::LightVolume(id))
}

pub fn plan(lights: &LightManager) -> VolumePlan {
    let mut plan = VolumePlan::default();
    for (id, light) in lights.iter() {
        if !light.is_visible() {
            log::warn!(
                "Skipping light at {:?}: color {:?} gives no influence radius",
                light.position(),
                light.color()
            );
            plan.skipped += 1;
            continue;
        }
        plan.steps.push(Step::Pass(light_pass(id)));
        plan.drawn += 1;
    }
    plan
}

/// Per-light data for the `light` uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightUniforms {
    pub world: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// xyz = position, w = influence radius.
    pub position_radius: [f32; 4],
}

pub struct VolumeLightingStage {
    mark_pipeline: wgpu::RenderPipeline,
    shade_pipeline: wgpu::RenderPipeline,
    frame: FrameBinding,
    light_group: GroupLayout,
    lights: DynamicUniforms<LightUniforms>,
    light_bind_group: wgpu::BindGroup,
    gbuffer_group: GroupLayout,
    gbuffer_bind_group: Option<wgpu::BindGroup>,
    volume: Mesh,
    slots: HashMap<LightId, usize>,
}

impl VolumeLightingStage {
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        frame_buffer: &wgpu::Buffer,
    ) -> Result<Self> {
        let frame = FrameBinding::required(device, program, frame_buffer)?;
        let light_slot = program.required("light")?;
        let light_group = GroupLayout::new(
            device,
            program,
            light_slot.group,
            &[(
                "light",
                Resource::DynamicUniform(DynamicUniforms::<LightUniforms>::binding_size()),
            )],
        )?;
        let gbuffer_slot = program.required("g_position")?;
        let gbuffer_group = GroupLayout::new(
            device,
            program,
            gbuffer_slot.group,
            &[
                ("g_position", Resource::Texture),
                ("g_normal", Resource::Texture),
                ("g_albedo_spec", Resource::Texture),
            ],
        )?;

        let lights = DynamicUniforms::new(device, "Light Uniforms", 128);
        let light_bind_group = light_group.bind(device, "Light Bind Group", [lights.binding()]);

        let module = program.create_module(device);
        let layout = pipeline_layout(
            device,
            program,
            &[frame.layout(), &light_group, &gbuffer_group],
        )?;
        let pipeline = |label, fragment_entry, kind: PassKind| {
            create_pipeline(
                device,
                &PipelineDesc {
                    label,
                    module: &module,
                    layout: &layout,
                    vertex_entry: "vs_main",
                    fragment_entry,
                    vertex_buffers: &[Vertex3d::LAYOUT],
                    color_formats: &[HDR_FORMAT],
                    state: kind.render_state(),
                },
            )
        };
        let mark_pipeline = pipeline("Light Mark Pipeline", "fs_mark", PassKind::LightMark);
        let shade_pipeline = pipeline("Light Shade Pipeline", "fs_shade", PassKind::LightShade);

        let volume = Mesh::upload(device, &MeshData::sphere(VOLUME_SEGMENTS, VOLUME_RINGS));

        Ok(Self {
            mark_pipeline,
            shade_pipeline,
            frame,
            light_group,
            lights,
            light_bind_group,
            gbuffer_group,
            gbuffer_bind_group: None,
            volume,
            slots: HashMap::new(),
        })
    }

    pub fn bind_targets(&mut self, device: &wgpu::Device, targets: &TargetSet) -> Result<()> {
        self.gbuffer_bind_group = Some(self.gbuffer_group.bind(
            device,
            "Light GBuffer Bind Group",
            [
                wgpu::BindingResource::TextureView(targets.view(TargetId::GPosition)?),
                wgpu::BindingResource::TextureView(targets.view(TargetId::GNormal)?),
                wgpu::BindingResource::TextureView(targets.view(TargetId::GAlbedoSpec)?),
            ],
        ));
        Ok(())
    }

    /// Upload uniforms for every visible light.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, lights: &LightManager) {
        self.slots.clear();
        let mut uniforms = Vec::with_capacity(lights.len());
        for (id, light) in lights.iter().filter(|(_, light)| light.is_visible()) {
            self.slots.insert(id, uniforms.len());
            uniforms.push(LightUniforms {
                world: light.volume_transform().to_cols_array_2d(),
                color: light.color().extend(1.0).to_array(),
                position_radius: light.position().extend(light.radius()).to_array(),
            });
        }

        if self.lights.write(device, queue, &uniforms) {
            self.light_bind_group =
                self.light_group
                    .bind(device, "Light Bind Group", [self.lights.binding()]);
        }
    }

    /// Draw one half of a light's volume. `kind` picks mark or shade.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, kind: PassKind, id: LightId) {
        let (Some(&slot), Some(gbuffer)) = (self.slots.get(&id), &self.gbuffer_bind_group) else {
            return;
        };
        let pipeline = match kind {
            PassKind::LightMark => &self.mark_pipeline,
            _ => &self.shade_pipeline,
        };
        pass.set_pipeline(pipeline);
        self.frame.set(pass);
        pass.set_bind_group(
            self.light_group.group,
            &self.light_bind_group,
            &[DynamicUniforms::<LightUniforms>::offset(slot)],
        );
        pass.set_bind_group(self.gbuffer_group.group, gbuffer, &[]);
        self.volume.draw(pass);
    }
}
