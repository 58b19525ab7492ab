//! wgpu implementation of [`RenderBackend`].

use glam::Vec3;

use crate::camera::FrameUniforms;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, MeshData, MeshId};
use crate::mipmap::MipmapGenerator;
use crate::programs::{ProgramId, ProgramLibrary};
use crate::render_graph::{
    Draw, FrameData, PassDescriptor, PassKind, RenderBackend, Step, TargetSet,
};
use crate::stages::ambient_lighting::AmbientLightingStage;
use crate::stages::ambient_occlusion::AmbientOcclusionStage;
use crate::stages::depth_relay;
use crate::stages::geometry::GeometryStage;
use crate::stages::tone_map::{AverageReadback, ToneMapStage};
use crate::stages::uniform_buffer;
use crate::stages::volume_lighting::VolumeLightingStage;
use crate::targets::{HDR_FORMAT, TargetId, TargetLayout};

/// Executes frame plans on the GPU.
///
/// Owns the device, every stage's pipelines, the uploaded meshes and the
/// offscreen targets. A surface image is acquired the first time a step
/// draws to [`TargetId::Surface`] and released by [`present`](RenderBackend::present).
pub struct WgpuBackend {
    gpu: GpuContext,
    frame_buffer: wgpu::Buffer,
    geometry: GeometryStage,
    occlusion: AmbientOcclusionStage,
    ambient: AmbientLightingStage,
    volumes: VolumeLightingStage,
    tone_map: ToneMapStage,
    mipmaps: MipmapGenerator,
    readback: AverageReadback,
    targets: Option<TargetSet>,
    meshes: Vec<Mesh>,
    surface_frame: Option<wgpu::SurfaceTexture>,
}

impl WgpuBackend {
    /// Build every stage from `programs`. Fails if a program is missing a
    /// binding its stage requires.
    pub fn new(
        gpu: GpuContext,
        programs: &ProgramLibrary,
        config: &RendererConfig,
    ) -> Result<Self> {
        programs.verify()?;
        let device = &gpu.device;
        let frame_buffer = uniform_buffer::<FrameUniforms>(device, "Frame Uniforms");

        let geometry =
            GeometryStage::new(device, programs.get(ProgramId::Geometry), &frame_buffer)?;
        let occlusion = AmbientOcclusionStage::new(
            device,
            &gpu.queue,
            programs.get(ProgramId::SsaoSample),
            programs.get(ProgramId::SsaoBlur),
            &frame_buffer,
            &config.ssao_settings,
        )?;
        let ambient = AmbientLightingStage::new(
            device,
            &gpu.queue,
            programs.get(ProgramId::Ambient),
            &frame_buffer,
            config.ambient_strength,
        )?;
        let volumes =
            VolumeLightingStage::new(device, programs.get(ProgramId::LightVolume), &frame_buffer)?;
        let tone_map = ToneMapStage::new(
            device,
            programs.get(ProgramId::ToneMap),
            &frame_buffer,
            gpu.format(),
        )?;
        let mut mipmaps = MipmapGenerator::new(device, programs.get(ProgramId::Mipmap))?;
        mipmaps.ensure_pipeline(device, HDR_FORMAT);
        let readback = AverageReadback::new(device);

        Ok(Self {
            gpu,
            frame_buffer,
            geometry,
            occlusion,
            ambient,
            volumes,
            tone_map,
            mipmaps,
            readback,
            targets: None,
            meshes: Vec::new(),
            surface_frame: None,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn acquire_surface(&mut self) -> Result<()> {
        if self.surface_frame.is_some() {
            return Ok(());
        }
        let frame = match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                let gpu = &self.gpu;
                gpu.surface.configure(&gpu.device, &gpu.config);
                gpu.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        self.surface_frame = Some(frame);
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &TargetSet,
        surface: Option<&wgpu::TextureView>,
        desc: &PassDescriptor,
    ) -> Result<()> {
        let colors = desc
            .colors
            .iter()
            .map(|color| {
                Ok(Some(wgpu::RenderPassColorAttachment {
                    view: resolve(targets, surface, color.target)?,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color.load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let depth_stencil = desc
            .depth_stencil
            .map(|ds| -> Result<_> {
                Ok(wgpu::RenderPassDepthStencilAttachment {
                    view: resolve(targets, surface, ds.target)?,
                    depth_ops: Some(wgpu::Operations {
                        load: ds.depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: ds.stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                })
            })
            .transpose()?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(desc.label),
            color_attachments: &colors,
            depth_stencil_attachment: depth_stencil,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for command in &desc.draws {
            pass.set_stencil_reference(command.kind.render_state().stencil.reference());
            match (command.kind, command.draw) {
                (PassKind::Geometry, Draw::SceneMeshes) => {
                    self.geometry.draw(&mut pass, &self.meshes)
                }
                (PassKind::SsaoSample, Draw::FullScreen) => self.occlusion.draw_sample(&mut pass),
                (PassKind::SsaoBlur, Draw::FullScreen) => self.occlusion.draw_blur(&mut pass),
                (PassKind::AmbientLighting, Draw::FullScreen) => self.ambient.draw(&mut pass),
                (kind @ (PassKind::LightMark | PassKind::LightShade), Draw::LightVolume(id)) => {
                    self.volumes.draw(&mut pass, kind, id)
                }
                (PassKind::ToneMap, Draw::FullScreen) => self.tone_map.draw(&mut pass),
                (kind, draw) => log::warn!("No pipeline draws {draw:?} for {kind:?}"),
            }
        }
        Ok(())
    }
}

fn resolve<'a>(
    targets: &'a TargetSet,
    surface: Option<&'a wgpu::TextureView>,
    id: TargetId,
) -> Result<&'a wgpu::TextureView> {
    if id == TargetId::Surface {
        surface.ok_or(RenderError::MissingTarget(id))
    } else {
        targets.view(id)
    }
}

impl RenderBackend for WgpuBackend {
    fn rebuild_targets(&mut self, layout: &TargetLayout) -> Result<()> {
        self.targets = None;
        self.gpu.resize(layout.width(), layout.height());

        let device = &self.gpu.device;
        let targets = TargetSet::create(device, *layout)?;
        self.occlusion.bind_targets(device, &targets)?;
        self.ambient.bind_targets(device, &targets)?;
        self.volumes.bind_targets(device, &targets)?;
        self.tone_map.bind_targets(device, &targets)?;
        self.targets = Some(targets);
        Ok(())
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        if target == TargetId::Surface {
            return Some((self.gpu.width(), self.gpu.height()));
        }
        self.targets.as_ref()?.get(target).ok().map(|t| t.size())
    }

    fn upload_mesh(&mut self, data: &MeshData) -> MeshId {
        self.meshes.push(Mesh::upload(&self.gpu.device, data));
        MeshId(self.meshes.len() - 1)
    }

    fn prepare(&mut self, frame: &FrameData<'_>) -> Result<()> {
        let (device, queue) = (&self.gpu.device, &self.gpu.queue);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame.uniforms));
        self.geometry
            .prepare(device, queue, frame.meshes, self.meshes.len())?;
        self.volumes.prepare(device, queue, frame.lights);
        Ok(())
    }

    fn execute(&mut self, steps: &[Step]) -> Result<()> {
        let draws_surface = steps
            .iter()
            .filter_map(Step::as_pass)
            .any(|pass| pass.colors.iter().any(|c| c.target == TargetId::Surface));
        if draws_surface {
            self.acquire_surface()?;
        }

        let targets = self.targets.as_ref().ok_or(RenderError::TargetsInvalid)?;
        let surface_view = self.surface_frame.as_ref().map(|frame| {
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        let device = &self.gpu.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        for step in steps {
            match step {
                Step::Pass(pass) => {
                    self.encode_pass(&mut encoder, targets, surface_view.as_ref(), pass)?
                }
                Step::CopyDepthStencil { from, to } => depth_relay::encode_copy(
                    &mut encoder,
                    &targets.get(*from)?.texture,
                    &targets.get(*to)?.texture,
                ),
                Step::GenerateMipmaps(target) => {
                    self.mipmaps
                        .generate(device, &mut encoder, &targets.get(*target)?.texture)
                }
            }
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn average_color(&mut self, target: TargetId) -> Result<Vec3> {
        let targets = self.targets.as_ref().ok_or(RenderError::TargetsInvalid)?;
        let texture = &targets.get(target)?.texture;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Average Readback Encoder"),
            });
        self.readback.encode(&mut encoder, texture);
        self.gpu.queue.submit(Some(encoder.finish()));
        self.readback.read(&self.gpu.device)
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.tone_map.set_exposure(&self.gpu.queue, exposure);
    }

    fn present(&mut self) -> Result<()> {
        if let Some(frame) = self.surface_frame.take() {
            frame.present();
        }
        Ok(())
    }
}
