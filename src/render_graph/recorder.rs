//! A GPU-free backend that records what it was asked to do.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::error::{RenderError, Result};
use crate::mesh::{MeshData, MeshId};
use crate::render_graph::{FrameData, RenderBackend, Step};
use crate::targets::{TargetId, TargetLayout};

/// One call made on a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    RebuildTargets { width: u32, height: u32 },
    UploadMesh(MeshId),
    Prepare { draws: usize, lights: usize },
    Execute(Step),
    ReadAverage(TargetId),
    SetExposure(f32),
    Present,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RecordedTarget {
    width: u32,
    height: u32,
    generation: u64,
}

/// Backend that executes nothing and logs everything.
///
/// Targets are tracked by size and creation generation so tests can check
/// that a resize replaced every one of them.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    targets: BTreeMap<TargetId, RecordedTarget>,
    generation: u64,
    meshes: usize,
    average: Vec3,
    exposure: Option<f32>,
    fail_rebuild: Option<TargetId>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color returned by every [`average_color`](RenderBackend::average_color) call.
    pub fn with_average(mut self, average: Vec3) -> Self {
        self.average = average;
        self
    }

    pub fn set_average(&mut self, average: Vec3) {
        self.average = average;
    }

    /// Make the next rebuild fail its completeness check on `target`.
    pub fn fail_next_rebuild(&mut self, target: TargetId) {
        self.fail_rebuild = Some(target);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Steps executed since the log was last cleared, in order.
    pub fn steps(&self) -> Vec<&Step> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Execute(step) => Some(step),
                _ => None,
            })
            .collect()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Whether every target was created by the most recent rebuild.
    pub fn targets_from_latest_rebuild(&self) -> bool {
        self.targets
            .values()
            .all(|t| t.generation == self.generation)
    }

    pub fn last_exposure(&self) -> Option<f32> {
        self.exposure
    }
}

impl RenderBackend for RecordingBackend {
    fn rebuild_targets(&mut self, layout: &TargetLayout) -> Result<()> {
        self.commands.push(Command::RebuildTargets {
            width: layout.width(),
            height: layout.height(),
        });
        self.targets.clear();

        if let Some(target) = self.fail_rebuild.take() {
            return Err(RenderError::IncompleteTarget {
                target,
                reason: "forced failure".to_string(),
            });
        }

        self.generation += 1;
        for spec in layout.specs() {
            self.targets.insert(
                spec.id,
                RecordedTarget {
                    width: spec.width,
                    height: spec.height,
                    generation: self.generation,
                },
            );
        }
        Ok(())
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|t| (t.width, t.height))
    }

    fn upload_mesh(&mut self, _data: &MeshData) -> MeshId {
        let id = MeshId(self.meshes);
        self.meshes += 1;
        self.commands.push(Command::UploadMesh(id));
        id
    }

    fn prepare(&mut self, frame: &FrameData<'_>) -> Result<()> {
        for draw in frame.meshes.draws() {
            if draw.mesh.0 >= self.meshes {
                return Err(RenderError::UnknownMesh(draw.mesh.0));
            }
        }
        self.commands.push(Command::Prepare {
            draws: frame.meshes.len(),
            lights: frame.lights.len(),
        });
        Ok(())
    }

    fn execute(&mut self, steps: &[Step]) -> Result<()> {
        for step in steps {
            if let Some(missing) = referenced_targets(step)
                .into_iter()
                .find(|id| *id != TargetId::Surface && !self.targets.contains_key(id))
            {
                return Err(RenderError::MissingTarget(missing));
            }
            self.commands.push(Command::Execute(step.clone()));
        }
        Ok(())
    }

    fn average_color(&mut self, target: TargetId) -> Result<Vec3> {
        if !self.targets.contains_key(&target) {
            return Err(RenderError::MissingTarget(target));
        }
        self.commands.push(Command::ReadAverage(target));
        Ok(self.average)
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.exposure = Some(exposure);
        self.commands.push(Command::SetExposure(exposure));
    }

    fn present(&mut self) -> Result<()> {
        self.commands.push(Command::Present);
        Ok(())
    }
}

/// Every target a step reads or writes.
pub fn referenced_targets(step: &Step) -> Vec<TargetId> {
    match step {
        Step::Pass(pass) => pass
            .colors
            .iter()
            .map(|c| c.target)
            .chain(pass.depth_stencil.map(|d| d.target))
            .collect(),
        Step::CopyDepthStencil { from, to } => vec![*from, *to],
        Step::GenerateMipmaps(target) => vec![*target],
    }
}
