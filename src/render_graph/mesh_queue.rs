//! Per-frame list of scene meshes to encode into the GBuffer.

use crate::mesh::{MeshId, Transform};

/// Surface properties written into the albedo+specular target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Linear base color.
    pub albedo: [f32; 3],
    /// Specular intensity in `[0, 1]`.
    pub specular: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: [1.0, 1.0, 1.0],
            specular: 0.5,
        }
    }
}

impl Material {
    pub fn new(albedo: [f32; 3], specular: f32) -> Self {
        Self { albedo, specular }
    }

    pub fn albedo_spec(&self) -> [f32; 4] {
        let [r, g, b] = self.albedo;
        [r, g, b, self.specular]
    }
}

/// One mesh instance queued for the geometry pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedMesh {
    pub mesh: MeshId,
    pub transform: Transform,
    pub material: Material,
}

/// Draw list filled by the scene each frame.
///
/// ```ignore
/// queue.draw(cube, Transform::from_position(Vec3::Y), Material::default());
/// renderer.render_frame(&camera, &queue, dt)?;
/// queue.clear_queue();
/// ```
#[derive(Clone, Debug, Default)]
pub struct MeshQueue {
    draws: Vec<QueuedMesh>,
}

impl MeshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, mesh: MeshId, transform: Transform, material: Material) {
        self.draws.push(QueuedMesh {
            mesh,
            transform,
            material,
        });
    }

    pub fn draws(&self) -> &[QueuedMesh] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Drop this frame's draws.
    pub fn clear_queue(&mut self) {
        self.draws.clear();
    }
}
