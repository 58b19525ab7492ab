//! Point lights and the collection the volume lighting stage iterates.

use glam::{Mat4, Vec3};
use slotmap::{DenseSlotMap, new_key_type};

new_key_type! {
    /// Generation-checked handle to a light in a [`LightManager`].
    pub struct LightId;
}

/// Constant, linear and quadratic attenuation terms shared by every light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

pub const ATTENUATION: Attenuation = Attenuation {
    constant: 1.0,
    linear: 0.7,
    quadratic: 1.8,
};

/// Intensity below which a light no longer visibly contributes, per unit of
/// its brightest channel.
pub const VISIBILITY_THRESHOLD: f32 = 256.0 / 5.0;

/// Longitudinal subdivisions of the light volume sphere.
pub const VOLUME_SEGMENTS: u32 = 16;
/// Latitudinal subdivisions of the light volume sphere.
pub const VOLUME_RINGS: u32 = 12;

/// Distance at which a light of the given color falls below the visibility
/// threshold. Returns 0 when the light is too dim to reach any distance.
pub fn influence_radius(color: Vec3) -> f32 {
    let Attenuation {
        constant: c,
        linear: l,
        quadratic: q,
    } = ATTENUATION;
    let brightest = color.max_element();
    let discriminant = l * l - 4.0 * q * (c - VISIBILITY_THRESHOLD * brightest);
    if discriminant < 0.0 {
        return 0.0;
    }
    let radius = (-l + discriminant.sqrt()) / (2.0 * q);
    if radius > 0.0 { radius } else { 0.0 }
}

/// Scale applied to the radius-0.5 volume mesh so the faceted sphere fully
/// contains a true sphere of radius 1.
pub fn volume_scale() -> f32 {
    use std::f32::consts::PI;
    let inset = (PI / VOLUME_SEGMENTS as f32).cos() * (PI / (2 * VOLUME_RINGS) as f32).cos();
    2.0 / inset
}

/// A dynamic point light with an HDR color.
///
/// The influence radius is derived from the color and kept in sync by
/// [`set_color`](Self::set_color).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    position: Vec3,
    color: Vec3,
    radius: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            radius: influence_radius(color),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.radius = influence_radius(color);
    }

    /// Whether the light reaches far enough to be worth drawing.
    pub fn is_visible(&self) -> bool {
        self.radius > 0.0
    }

    /// World transform of the volume mesh: translate, then scale by radius.
    pub fn volume_transform(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_scale(Vec3::splat(self.radius * volume_scale()))
    }
}

/// Dense storage for the scene's point lights.
///
/// Removal swaps the last light into the freed slot, so iteration order is
/// not stable. Handles stay valid across other removals and a removed handle
/// never resolves to a newer light.
#[derive(Default)]
pub struct LightManager {
    lights: DenseSlotMap<LightId, PointLight>,
}

impl LightManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, light: PointLight) -> LightId {
        self.lights.insert(light)
    }

    pub fn remove(&mut self, id: LightId) -> Option<PointLight> {
        self.lights.remove(id)
    }

    pub fn get(&self, id: LightId) -> Option<&PointLight> {
        self.lights.get(id)
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut PointLight> {
        self.lights.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (LightId, &PointLight)> {
        self.lights.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (LightId, &mut PointLight)> {
        self.lights.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshData;

    #[test]
    fn radius_of_unit_red() {
        let radius = influence_radius(Vec3::new(1.0, 0.0, 0.0));
        let expected = (-0.7 + (0.49f32 - 7.2 * (1.0 - 51.2)).sqrt()) / 3.6;
        assert!((radius - expected).abs() < 1e-4);
        assert!((radius - 5.0901).abs() < 1e-3);
    }

    #[test]
    fn radius_grows_with_brightest_channel() {
        let mut previous = 0.0;
        for step in 1..=20 {
            let radius = influence_radius(Vec3::new(step as f32 * 0.5, 0.2, 0.1));
            assert!(radius > previous);
            previous = radius;
        }
    }

    #[test]
    fn radius_ignores_dimmer_channels() {
        let a = influence_radius(Vec3::new(2.0, 0.0, 0.0));
        let b = influence_radius(Vec3::new(2.0, 1.5, 0.3));
        assert_eq!(a, b);
    }

    #[test]
    fn black_light_has_no_radius() {
        let light = PointLight::new(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(light.radius(), 0.0);
        assert!(!light.is_visible());
    }

    #[test]
    fn set_color_recomputes_radius() {
        let mut light = PointLight::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let before = light.radius();
        light.set_color(Vec3::new(0.0, 4.0, 0.0));
        assert!(light.radius() > before);
    }

    #[test]
    fn volume_contains_radius() {
        let light = PointLight::new(Vec3::new(3.0, 1.0, -2.0), Vec3::ONE);
        let m = light.volume_transform();
        assert_eq!(m.transform_point3(Vec3::ZERO), light.position());

        let mesh = MeshData::sphere(VOLUME_SEGMENTS, VOLUME_RINGS);
        let points: Vec<Vec3> = mesh
            .vertices
            .iter()
            .map(|v| m.transform_point3(Vec3::from_array(v.position)) - light.position())
            .collect();

        // every face plane must clear the influence sphere
        let min_edge = light.radius() * 1e-3;
        let mut nearest = f32::MAX;
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| points[tri[i] as usize]);
            if (b - a).length() < min_edge
                || (c - a).length() < min_edge
                || (c - b).length() < min_edge
            {
                // collapsed triangles at the poles
                continue;
            }
            let normal = (b - a).cross(c - a).normalize();
            nearest = nearest.min(normal.dot(a).abs());
        }
        assert!(nearest >= light.radius(), "{nearest} < {}", light.radius());
        // and the proxy is not much larger than it needs to be
        assert!(nearest < light.radius() * 1.01);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut lights = LightManager::new();
        let a = lights.add(PointLight::new(Vec3::ZERO, Vec3::X));
        let b = lights.add(PointLight::new(Vec3::ONE, Vec3::Y));
        let c = lights.add(PointLight::new(Vec3::NEG_ONE, Vec3::Z));

        assert!(lights.remove(b).is_some());
        assert_eq!(lights.len(), 2);
        assert!(lights.get(b).is_none());
        assert!(lights.remove(b).is_none());

        // survivors keep their handles after the swap
        assert_eq!(lights.get(a).map(|l| l.position()), Some(Vec3::ZERO));
        assert_eq!(lights.get(c).map(|l| l.position()), Some(Vec3::NEG_ONE));

        let d = lights.add(PointLight::new(Vec3::X, Vec3::X));
        assert_ne!(d, b);
        assert!(lights.get(b).is_none());
    }
}
