//! Auto-exposure state driven by the average scene color.
//!
//! Once per frame the tone-map stage reads back the coarsest mip of the HDR
//! light buffer and feeds it to [`ExposureState::update`]. The exposure eases
//! toward `1 / (luminance + 0.6)` with asymmetric rates: darkening follows a
//! 0.5 s time constant while brightening is rate-limited to `0.2` per second.

use glam::Vec3;

/// Channel weights used to collapse the average color into one luminance value.
pub const LUMINANCE_WEIGHTS: Vec3 = Vec3::new(0.21, 0.71, 0.07);

/// Bias added to luminance before inverting it into a target exposure.
pub const LUMINANCE_BIAS: f32 = 0.6;

/// Time constant in seconds for moving toward a lower exposure.
pub const DARKEN_TIME: f32 = 0.5;

/// Maximum exposure increase per second.
pub const BRIGHTEN_RATE: f32 = 0.2;

/// Weighted luminance of a linear HDR color.
pub fn luminance(color: Vec3) -> f32 {
    color.dot(LUMINANCE_WEIGHTS)
}

/// The exposure that would map a scene of the given luminance to mid-range.
pub fn target_exposure(luminance: f32) -> f32 {
    1.0 / (luminance + LUMINANCE_BIAS)
}

/// The single scalar exposure carried across frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExposureState {
    value: f32,
    last_luminance: f32,
}

impl Default for ExposureState {
    fn default() -> Self {
        Self {
            value: 1.0,
            last_luminance: 0.0,
        }
    }
}

impl ExposureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current exposure multiplier.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Luminance measured by the most recent [`update`](Self::update).
    pub fn last_luminance(&self) -> f32 {
        self.last_luminance
    }

    /// Feed the frame's average color and advance the exposure by `dt` seconds.
    ///
    /// Non-finite measurements (an HDR overflow in the light buffer) leave the
    /// exposure where it was.
    pub fn update(&mut self, average_color: Vec3, dt: f32) -> f32 {
        let lum = luminance(average_color);
        let target = target_exposure(lum);
        if !lum.is_finite() || !target.is_finite() || target < 0.0 {
            log::warn!("Ignoring non-finite scene luminance {lum}");
            return self.value;
        }
        self.last_luminance = lum;
        self.approach(target, dt)
    }

    /// Move the exposure toward `target` using the asymmetric smoothing rule.
    pub fn approach(&mut self, target: f32, dt: f32) -> f32 {
        let dt = dt.max(0.0);
        let diff = target - self.value;
        if diff < 0.0 {
            // fraction is capped at 1 so a long frame lands on the target
            self.value += diff * (dt / DARKEN_TIME).min(1.0);
        } else {
            self.value += diff.min(BRIGHTEN_RATE * dt);
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn luminance_weights() {
        assert!(approx(luminance(Vec3::new(1.0, 0.0, 0.0)), 0.21));
        assert!(approx(luminance(Vec3::new(0.0, 1.0, 0.0)), 0.71));
        assert!(approx(luminance(Vec3::new(0.0, 0.0, 1.0)), 0.07));
        assert!(approx(luminance(Vec3::ONE), 0.99));
    }

    #[test]
    fn target_of_black_scene() {
        assert!(approx(target_exposure(0.0), 1.0 / 0.6));
    }

    #[test]
    fn darkening_step_is_linear_in_dt() {
        let mut state = ExposureState::new();
        let value = state.approach(0.5, 0.1);
        // diff = -0.5, step = -0.5 * 0.1 / 0.5
        assert!(approx(value, 0.9));
    }

    #[test]
    fn darkening_never_overshoots() {
        let mut state = ExposureState::new();
        let value = state.approach(0.5, 3.0);
        assert!(approx(value, 0.5));
    }

    #[test]
    fn brightening_is_rate_limited() {
        let mut state = ExposureState::new();
        let value = state.approach(2.0, 0.5);
        assert!(approx(value, 1.1));
    }

    #[test]
    fn brightening_never_overshoots() {
        let mut state = ExposureState::new();
        let value = state.approach(1.05, 10.0);
        assert!(approx(value, 1.05));
    }

    #[test]
    fn update_uses_weighted_luminance() {
        let mut state = ExposureState::new();
        // grey 1.4 / 0.99 gives luminance 1.4 and target 0.5
        let grey = Vec3::splat(1.4 / 0.99);
        let value = state.update(grey, 0.25);
        assert!(approx(state.last_luminance(), 1.4));
        assert!(approx(value, 0.75));
    }

    #[test]
    fn non_finite_color_is_ignored() {
        let mut state = ExposureState::new();
        state.update(Vec3::new(f32::INFINITY, 0.0, 0.0), 0.016);
        assert_eq!(state.value(), 1.0);
    }

    #[test]
    fn converges_under_constant_scene() {
        let mut state = ExposureState::new();
        let color = Vec3::splat(0.4);
        for _ in 0..2000 {
            state.update(color, 1.0 / 60.0);
        }
        assert!(approx(state.value(), target_exposure(luminance(color))));
    }
}
