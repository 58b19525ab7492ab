//! GBuffer encoding.
//!
//! Rasterizes every queued mesh into world position, world normal and
//! albedo+specular, filling GBuffer depth and clearing its stencil for the
//! stages that follow.

use crate::error::{RenderError, Result};
use crate::mesh::{Mesh, MeshId, Vertex3d};
use crate::programs::ShaderProgram;
use crate::render_graph::{Draw, MeshQueue, PassDescriptor, PassKind, Step};
use crate::stages::{
    DynamicUniforms, FrameBinding, GroupLayout, PipelineDesc, Resource, create_pipeline,
    pipeline_layout,
};
use crate::targets::TargetId;

/// Color attachments written by the geometry pass, in location order.
pub const GBUFFER_COLORS: [TargetId; 3] = [
    TargetId::GPosition,
    TargetId::GNormal,
    TargetId::GAlbedoSpec,
];

pub fn plan() -> Vec<Step> {
    let clear = wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT);
    let pass = GBUFFER_COLORS
        .iter()
        .fold(PassDescriptor::new("Geometry Pass"), |pass, &target| {
            pass.color(target, clear)
        })
        .depth_stencil(
            TargetId::GDepth,
            wgpu::LoadOp::Clear(1.0),
            wgpu::LoadOp::Clear(0),
        )
        .draw(PassKind::Geometry, Draw::SceneMeshes);
    vec![Step::Pass(pass)]
}

/// Per-draw data for `model_uniforms`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub albedo_spec: [f32; 4],
}

pub struct GeometryStage {
    pipeline: wgpu::RenderPipeline,
    frame: FrameBinding,
    model_group: GroupLayout,
    models: DynamicUniforms<ModelUniforms>,
    model_bind_group: wgpu::BindGroup,
    draws: Vec<MeshId>,
}

impl GeometryStage {
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        frame_buffer: &wgpu::Buffer,
    ) -> Result<Self> {
        let frame = FrameBinding::required(device, program, frame_buffer)?;
        let model_slot = program.required("model_uniforms")?;
        let model_group = GroupLayout::new(
            device,
            program,
            model_slot.group,
            &[(
                "model_uniforms",
                Resource::DynamicUniform(DynamicUniforms::<ModelUniforms>::binding_size()),
            )],
        )?;
        let models = DynamicUniforms::new(device, "Model Uniforms", 64);
        let model_bind_group = model_group.bind(device, "Model Bind Group", [models.binding()]);

        let module = program.create_module(device);
        let layout = pipeline_layout(device, program, &[frame.layout(), &model_group])?;
        let color_formats: Vec<_> = GBUFFER_COLORS.iter().filter_map(|t| t.format()).collect();
        let pipeline = create_pipeline(
            device,
            &PipelineDesc {
                label: "Geometry Pipeline",
                module: &module,
                layout: &layout,
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                vertex_buffers: &[Vertex3d::LAYOUT],
                color_formats: &color_formats,
                state: PassKind::Geometry.render_state(),
            },
        );

        Ok(Self {
            pipeline,
            frame,
            model_group,
            models,
            model_bind_group,
            draws: Vec::new(),
        })
    }

    /// Upload model data for every queued mesh.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        meshes: &MeshQueue,
        mesh_count: usize,
    ) -> Result<()> {
        self.draws.clear();
        let mut uniforms = Vec::with_capacity(meshes.len());
        for draw in meshes.draws() {
            if draw.mesh.0 >= mesh_count {
                return Err(RenderError::UnknownMesh(draw.mesh.0));
            }
            self.draws.push(draw.mesh);
            uniforms.push(ModelUniforms {
                model: draw.transform.matrix().to_cols_array_2d(),
                normal_matrix: draw.transform.normal_matrix().to_cols_array_2d(),
                albedo_spec: draw.material.albedo_spec(),
            });
        }

        if self.models.write(device, queue, &uniforms) {
            self.model_bind_group =
                self.model_group
                    .bind(device, "Model Bind Group", [self.models.binding()]);
        }
        Ok(())
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, meshes: &[Mesh]) {
        pass.set_pipeline(&self.pipeline);
        self.frame.set(pass);
        for (index, id) in self.draws.iter().enumerate() {
            let offset = DynamicUniforms::<ModelUniforms>::offset(index);
            pass.set_bind_group(self.model_group.group, &self.model_bind_group, &[offset]);
            meshes[id.0].draw(pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_every_gbuffer_attachment() {
        let steps = plan();
        assert_eq!(steps.len(), 1);
        let pass = steps[0].as_pass().unwrap();

        let targets: Vec<_> = pass.colors.iter().map(|c| c.target).collect();
        assert_eq!(targets, GBUFFER_COLORS);
        for color in &pass.colors {
            assert_eq!(color.load, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT));
        }

        let depth = pass.depth_stencil.unwrap();
        assert_eq!(depth.target, TargetId::GDepth);
        assert_eq!(depth.depth_load, wgpu::LoadOp::Clear(1.0));
        assert_eq!(depth.stencil_load, wgpu::LoadOp::Clear(0));
    }

    #[test]
    fn draws_scene_meshes_with_geometry_state() {
        let steps = plan();
        let pass = steps[0].as_pass().unwrap();
        assert_eq!(pass.draws.len(), 1);
        assert_eq!(pass.draws[0].kind, PassKind::Geometry);
        assert_eq!(pass.draws[0].draw, Draw::SceneMeshes);
    }

    #[test]
    fn model_uniforms_fit_dynamic_stride() {
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 144);
        let size = std::mem::size_of::<ModelUniforms>() as u64;
        assert!(size <= crate::stages::DYNAMIC_STRIDE);
    }
}
