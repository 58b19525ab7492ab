//! The frame orchestrator.
//!
//! [`Renderer`] owns the lights, exposure, toggles and target lifecycle, and
//! drives a [`RenderBackend`] through the same sequence every frame:
//!
//! 1. upload camera, mesh and light data
//! 2. geometry, depth relay, ambient occlusion, ambient and volume lighting,
//!    then reduction of the light buffer
//! 3. read back the average color and update exposure
//! 4. tone map onto the surface and present

use crate::camera::{Camera, FrameUniforms, Projection};
use crate::config::{FrameToggles, RendererConfig};
use crate::error::{RenderError, Result};
use crate::exposure::ExposureState;
use crate::light::LightManager;
use crate::mesh::{MeshData, MeshId};
use crate::render_graph::{FrameData, MeshQueue, RenderBackend, Step};
use crate::stages::{
    ambient_lighting, ambient_occlusion, depth_relay, geometry, tone_map, volume_lighting,
};
use crate::targets::{TargetId, TargetLayout};

/// Whether the renderer currently has targets to draw into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetStatus {
    Ready(TargetLayout),
    /// The window is zero-sized; frames are skipped until the next resize.
    Suspended,
    /// The last (re)creation failed; rendering is refused until a resize
    /// succeeds.
    Invalid,
}

/// What one call to [`Renderer::render_frame`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// `false` when the frame was skipped because rendering is suspended.
    pub rendered: bool,
    pub lights_drawn: usize,
    pub lights_skipped: usize,
    pub exposure: f32,
    pub luminance: f32,
}

/// The steps of one frame, split around the exposure readback.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    /// Everything up to and including reduction of the light buffer.
    pub scene: Vec<Step>,
    /// Tone mapping onto the surface.
    pub present: Vec<Step>,
    pub lights_drawn: usize,
    pub lights_skipped: usize,
}

/// Assemble the frame for the given toggles and lights.
pub fn frame_plan(toggles: FrameToggles, lights: &LightManager) -> FramePlan {
    let mut scene = geometry::plan();
    scene.extend(depth_relay::plan(toggles.ssao));
    scene.extend(ambient_occlusion::plan(toggles.ssao));
    scene.extend(ambient_lighting::plan());

    let (mut lights_drawn, mut lights_skipped) = (0, 0);
    if toggles.dynamic_lighting {
        let volumes = volume_lighting::plan(lights);
        lights_drawn = volumes.drawn;
        lights_skipped = volumes.skipped;
        scene.extend(volumes.steps);
        scene.extend(depth_relay::restore());
    }
    scene.extend(tone_map::reduce());

    FramePlan {
        scene,
        present: tone_map::plan(),
        lights_drawn,
        lights_skipped,
    }
}

/// Deferred renderer over a [`RenderBackend`].
///
/// ```ignore
/// let mut renderer = Renderer::new(backend, &config)?;
/// let cube = renderer.upload_mesh(&MeshData::cube());
/// renderer.lights_mut().add(PointLight::new(Vec3::Y * 3.0, Vec3::ONE));
///
/// queue.draw(cube, Transform::new(), Material::default());
/// let stats = renderer.render_frame(&camera, &queue, dt)?;
/// ```
pub struct Renderer<B: RenderBackend> {
    backend: B,
    toggles: FrameToggles,
    projection: Projection,
    exposure: ExposureState,
    lights: LightManager,
    status: TargetStatus,
}

impl<B: RenderBackend> Renderer<B> {
    /// Create the renderer and its initial targets. Failure to create the
    /// targets is fatal.
    pub fn new(backend: B, config: &RendererConfig) -> Result<Self> {
        let mut renderer = Self {
            backend,
            toggles: config.toggles,
            projection: Projection::new(config.width, config.height),
            exposure: ExposureState::new(),
            lights: LightManager::new(),
            status: TargetStatus::Suspended,
        };
        renderer.resize(config.width, config.height)?;
        log::info!(
            "Renderer ready: ssao={} dynamic_lighting={} forward={}",
            config.toggles.ssao,
            config.toggles.dynamic_lighting,
            config.toggles.forward
        );
        Ok(renderer)
    }

    /// Recreate every target at `width` x `height` and update the projection.
    ///
    /// A zero dimension suspends rendering. A repeated resize to the current
    /// size is a no-op. If recreation fails the renderer is left without
    /// targets and the error is returned.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            if self.status != TargetStatus::Suspended {
                log::info!("Window is {width}x{height}, suspending rendering");
            }
            self.status = TargetStatus::Suspended;
            return Ok(());
        }

        let layout = TargetLayout::new(width, height)?;
        if self.status == TargetStatus::Ready(layout) {
            log::debug!("Targets already {width}x{height}");
            return Ok(());
        }

        match self.backend.rebuild_targets(&layout) {
            Ok(()) => {
                self.projection = Projection::new(width, height);
                self.status = TargetStatus::Ready(layout);
                log::info!("Render targets resized to {width}x{height}");
                Ok(())
            }
            Err(e) => {
                self.status = TargetStatus::Invalid;
                Err(e)
            }
        }
    }

    /// Render one frame of `meshes` seen through `camera`, `dt` seconds
    /// after the previous one.
    pub fn render_frame(
        &mut self,
        camera: &Camera,
        meshes: &MeshQueue,
        dt: f32,
    ) -> Result<FrameStats> {
        match self.status {
            TargetStatus::Ready(_) => {}
            TargetStatus::Suspended => {
                return Ok(FrameStats {
                    exposure: self.exposure.value(),
                    luminance: self.exposure.last_luminance(),
                    ..Default::default()
                });
            }
            TargetStatus::Invalid => return Err(RenderError::TargetsInvalid),
        }

        self.backend.prepare(&FrameData {
            uniforms: FrameUniforms::new(camera, &self.projection),
            meshes,
            lights: &self.lights,
        })?;

        let plan = frame_plan(self.toggles, &self.lights);
        self.backend.execute(&plan.scene)?;

        let average = self.backend.average_color(TargetId::LightColor)?;
        let exposure = self.exposure.update(average, dt);
        log::debug!(
            "average {average:?}, luminance {:.3}, exposure {exposure:.3}",
            self.exposure.last_luminance()
        );
        self.backend.set_exposure(exposure);

        self.backend.execute(&plan.present)?;
        self.backend.present()?;

        Ok(FrameStats {
            rendered: true,
            lights_drawn: plan.lights_drawn,
            lights_skipped: plan.lights_skipped,
            exposure,
            luminance: self.exposure.last_luminance(),
        })
    }

    pub fn upload_mesh(&mut self, data: &MeshData) -> MeshId {
        self.backend.upload_mesh(data)
    }

    pub fn lights(&self) -> &LightManager {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightManager {
        &mut self.lights
    }

    pub fn toggles(&self) -> FrameToggles {
        self.toggles
    }

    pub fn set_ssao(&mut self, enabled: bool) {
        self.toggles.ssao = enabled;
        log::info!("SSAO {}", on_off(enabled));
    }

    pub fn set_dynamic_lighting(&mut self, enabled: bool) {
        self.toggles.dynamic_lighting = enabled;
        log::info!("Dynamic lighting {}", on_off(enabled));
    }

    /// Record a forward rendering request. The frame stays deferred.
    pub fn set_forward(&mut self, enabled: bool) {
        self.toggles.forward = enabled;
        log::info!(
            "Forward rendering {} (deferred pipeline remains active)",
            on_off(enabled)
        );
    }

    pub fn exposure(&self) -> &ExposureState {
        &self.exposure
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn status(&self) -> TargetStatus {
        self.status
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
