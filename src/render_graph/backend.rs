//! The seam between frame planning and command submission.

use glam::Vec3;

use crate::camera::FrameUniforms;
use crate::error::Result;
use crate::light::LightManager;
use crate::mesh::{MeshData, MeshId};
use crate::render_graph::{MeshQueue, Step};
use crate::targets::{TargetId, TargetLayout};

/// Scene inputs uploaded once per frame before any step executes.
pub struct FrameData<'a> {
    pub uniforms: FrameUniforms,
    pub meshes: &'a MeshQueue,
    pub lights: &'a LightManager,
}

/// Executes frame plans.
///
/// The renderer decides *what* runs and in which order; a backend owns the
/// targets and turns each [`Step`] into work. [`WgpuBackend`] submits to a
/// GPU, [`RecordingBackend`] keeps a log for tests.
///
/// [`WgpuBackend`]: crate::render_graph::WgpuBackend
/// [`RecordingBackend`]: crate::render_graph::RecordingBackend
pub trait RenderBackend {
    /// Drop every offscreen target and create the set described by `layout`.
    ///
    /// Either every target is replaced or, on error, none remain.
    fn rebuild_targets(&mut self, layout: &TargetLayout) -> Result<()>;

    /// Current size of `target`, or `None` if it does not exist.
    fn target_size(&self, target: TargetId) -> Option<(u32, u32)>;

    fn upload_mesh(&mut self, data: &MeshData) -> MeshId;

    /// Upload camera, per-mesh and per-light data for this frame.
    fn prepare(&mut self, frame: &FrameData<'_>) -> Result<()>;

    /// Run the steps in order.
    fn execute(&mut self, steps: &[Step]) -> Result<()>;

    /// Average color of `target`, read from its coarsest mip level.
    fn average_color(&mut self, target: TargetId) -> Result<Vec3>;

    fn set_exposure(&mut self, exposure: f32);

    /// Hand the finished surface image to the display.
    fn present(&mut self) -> Result<()>;
}
