//! The interactive demo: a fly-through scene lit by animated point lights.
//!
//! Controls:
//!
//! | Key | Action |
//! |-----|--------|
//! | W A S D | move |
//! | Space / Left Shift, Left Ctrl | up, down |
//! | right mouse drag | look (always on while the mouse is grabbed) |
//! | Left Alt | grab / release the mouse |
//! | N, B, M | toggle SSAO, dynamic lighting, forward shading |
//! | `=` `]` | add 1 / 10 random lights |
//! | `-` `[` | remove 1 / 10 lights |
//! | 0 | remove every light |
//! | F10 | borderless fullscreen |
//! | Esc | quit |

use std::sync::Arc;
use std::time::Instant;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{CursorGrabMode, Fullscreen, Window, WindowAttributes, WindowId};

use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::light::{LightId, LightManager, PointLight};
use crate::mesh::{MeshData, MeshId, Transform};
use crate::programs::ProgramLibrary;
use crate::render_graph::{Material, MeshQueue, WgpuBackend};
use crate::renderer::{FrameStats, Renderer};

/// Camera speed in units per second.
const MOVE_SPEED: f32 = 5.0;
/// Degrees of rotation for a mouse movement spanning the window height.
const LOOK_SENSITIVITY: f32 = 50.0;

/// Random lights are placed inside this box.
const SCENE_MIN: Vec3 = Vec3::new(-20.0, 0.5, -20.0);
const SCENE_MAX: Vec3 = Vec3::new(20.0, 6.0, 20.0);

const ORBIT_LIGHTS: usize = 8;

/// Open a window and run the demo until it is closed.
///
/// Returns the error that stopped the demo, if any. Errors are also logged
/// before the event loop exits.
pub fn run(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GloamApp {
        state: AppState::Pending(config),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct GloamApp {
    state: AppState,
    error: Option<RenderError>,
}

enum AppState {
    Pending(RendererConfig),
    Running(Box<Demo>),
    Stopped,
}

impl GloamApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: RenderError) {
        log::error!("{error}");
        self.error = Some(error);
        self.state = AppState::Stopped;
        event_loop.exit();
    }
}

impl ApplicationHandler for GloamApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending(config) = &self.state else {
            return;
        };
        match Demo::new(event_loop, config) {
            Ok(demo) => self.state = AppState::Running(Box::new(demo)),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(demo) = &mut self.state else {
            return;
        };
        demo.input.handle_event(&event);

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => demo.renderer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if demo.input.key_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                let result = demo.frame();
                demo.window.request_redraw();
                result
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let AppState::Running(demo) = &mut self.state {
            demo.input.handle_device_event(&event);
        }
    }
}

struct SceneMeshes {
    cube: MeshId,
    sphere: MeshId,
    plane: MeshId,
}

struct Demo {
    window: Arc<Window>,
    renderer: Renderer<WgpuBackend>,
    camera: Camera,
    input: Input,
    meshes: SceneMeshes,
    queue: MeshQueue,
    rig: LightRig,
    rng: StdRng,
    grabbed: bool,
    start_time: Instant,
    last_frame: Instant,
    title: String,
    title_timer: f32,
    frames: u32,
}

impl Demo {
    fn new(event_loop: &ActiveEventLoop, config: &RendererConfig) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let size = window.inner_size();
        let config = config.clone().size(size.width, size.height);
        let gpu = GpuContext::new(window.clone(), &config)?;
        let backend = WgpuBackend::new(gpu, &ProgramLibrary::builtin(), &config)?;
        let mut renderer = Renderer::new(backend, &config)?;

        let meshes = SceneMeshes {
            cube: renderer.upload_mesh(&MeshData::cube()),
            sphere: renderer.upload_mesh(&MeshData::sphere(32, 16)),
            plane: renderer.upload_mesh(&MeshData::plane(60.0)),
        };

        let mut rig = LightRig::default();
        rig.add_orbits(renderer.lights_mut(), ORBIT_LIGHTS);

        let now = Instant::now();
        Ok(Self {
            window,
            renderer,
            camera: Camera::new(),
            input: Input::new(),
            meshes,
            queue: MeshQueue::new(),
            rig,
            rng: StdRng::from_entropy(),
            grabbed: false,
            start_time: now,
            last_frame: now,
            title: config.title,
            title_timer: 0.0,
            frames: 0,
        })
    }

    fn frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.handle_keys();
        self.move_camera(dt);
        self.rig.animate(
            self.renderer.lights_mut(),
            self.start_time.elapsed().as_secs_f32(),
        );
        self.build_scene();

        let stats = self.renderer.render_frame(&self.camera, &self.queue, dt)?;
        self.input.begin_frame();
        self.update_title(dt, &stats);
        Ok(())
    }

    fn handle_keys(&mut self) {
        if self.input.key_pressed(KeyCode::KeyN) {
            let enabled = !self.renderer.toggles().ssao;
            self.renderer.set_ssao(enabled);
        }
        if self.input.key_pressed(KeyCode::KeyB) {
            let enabled = !self.renderer.toggles().dynamic_lighting;
            self.renderer.set_dynamic_lighting(enabled);
        }
        if self.input.key_pressed(KeyCode::KeyM) {
            let enabled = !self.renderer.toggles().forward;
            self.renderer.set_forward(enabled);
        }

        let lights = self.renderer.lights_mut();
        if self.input.key_pressed(KeyCode::Equal) {
            self.rig.add_random(lights, &mut self.rng, 1);
        }
        if self.input.key_pressed(KeyCode::BracketRight) {
            self.rig.add_random(lights, &mut self.rng, 10);
        }
        if self.input.key_pressed(KeyCode::Minus) {
            self.rig.remove(lights, 1);
        }
        if self.input.key_pressed(KeyCode::BracketLeft) {
            self.rig.remove(lights, 10);
        }
        if self.input.key_pressed(KeyCode::Digit0) {
            self.rig.remove(lights, usize::MAX);
        }

        if self.input.key_pressed(KeyCode::AltLeft) {
            self.set_grab(!self.grabbed);
        }
        if self.input.key_pressed(KeyCode::F10) {
            let fullscreen = match self.window.fullscreen() {
                Some(_) => None,
                None => Some(Fullscreen::Borderless(None)),
            };
            self.window.set_fullscreen(fullscreen);
        }
    }

    fn set_grab(&mut self, grab: bool) {
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => {
                self.grabbed = grab;
                self.window.set_cursor_visible(!grab);
            }
            Err(e) => log::warn!("Could not change cursor grab: {e}"),
        }
    }

    fn move_camera(&mut self, dt: f32) {
        if self.grabbed || self.input.mouse_down(MouseButton::Right) {
            let motion = self.input.mouse_motion();
            let height = self.window.inner_size().height.max(1) as f32;
            self.camera
                .rotate(motion.y, motion.x, LOOK_SENSITIVITY / height);
        }
        self.camera
            .translate_local(self.input.movement_axis() * MOVE_SPEED * dt);
    }

    fn build_scene(&mut self) {
        self.queue.clear_queue();
        populate_scene(&mut self.queue, &self.meshes);
    }

    fn update_title(&mut self, dt: f32, stats: &FrameStats) {
        self.frames += 1;
        self.title_timer += dt;
        if self.title_timer < 1.0 {
            return;
        }
        let fps = self.frames as f32 / self.title_timer;
        self.window.set_title(&format!(
            "{} | {fps:.0} fps | {} lights ({} skipped) | exposure {:.2}",
            self.title,
            stats.lights_drawn,
            stats.lights_skipped,
            stats.exposure
        ));
        self.frames = 0;
        self.title_timer = 0.0;
    }
}

/// How a demo light moves.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Motion {
    Fixed,
    /// Circles `center` at `radius`, `speed` radians per second from `phase`.
    Orbit {
        center: Vec3,
        radius: f32,
        speed: f32,
        phase: f32,
    },
}

impl Motion {
    fn position_at(&self, time: f32) -> Option<Vec3> {
        match *self {
            Motion::Fixed => None,
            Motion::Orbit {
                center,
                radius,
                speed,
                phase,
            } => {
                let angle = phase + speed * time;
                Some(center + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius)
            }
        }
    }
}

/// The lights the demo has created, newest last.
#[derive(Default)]
struct LightRig {
    lights: Vec<(LightId, Motion)>,
}

impl LightRig {
    fn add_orbits(&mut self, manager: &mut LightManager, count: usize) {
        for i in 0..count {
            let t = i as f32 / count as f32;
            let motion = Motion::Orbit {
                center: Vec3::new(0.0, 1.5, 0.0),
                radius: 6.0 + 10.0 * t,
                speed: if i % 2 == 0 { 0.4 } else { -0.3 },
                phase: t * std::f32::consts::TAU,
            };
            let color = hue(t) * 4.0;
            let position = motion.position_at(0.0).unwrap_or_default();
            let id = manager.add(PointLight::new(position, color));
            self.lights.push((id, motion));
        }
    }

    fn add_random(&mut self, manager: &mut LightManager, rng: &mut impl Rng, count: usize) {
        for _ in 0..count {
            let id = manager.add(random_light(rng));
            self.lights.push((id, Motion::Fixed));
        }
        log::info!("Added {count} light(s), {} total", manager.len());
    }

    /// Remove up to `count` of the newest lights; returns how many went.
    fn remove(&mut self, manager: &mut LightManager, count: usize) -> usize {
        let keep = self.lights.len().saturating_sub(count);
        let removed = self.lights.len() - keep;
        for (id, _) in self.lights.drain(keep..) {
            manager.remove(id);
        }
        if removed > 0 {
            log::info!("Removed {removed} light(s), {} left", manager.len());
        }
        removed
    }

    fn animate(&self, manager: &mut LightManager, time: f32) {
        for (id, motion) in &self.lights {
            if let Some(position) = motion.position_at(time)
                && let Some(light) = manager.get_mut(*id)
            {
                light.set_position(position);
            }
        }
    }
}

fn random_light(rng: &mut impl Rng) -> PointLight {
    let position = Vec3::new(
        rng.gen_range(SCENE_MIN.x..=SCENE_MAX.x),
        rng.gen_range(SCENE_MIN.y..=SCENE_MAX.y),
        rng.gen_range(SCENE_MIN.z..=SCENE_MAX.z),
    );
    let color = Vec3::new(
        rng.gen_range(0.0..=1.0),
        rng.gen_range(0.0..=1.0),
        rng.gen_range(0.0..=1.0),
    );
    PointLight::new(position, color * rng.gen_range(1.0..=5.0))
}

/// Queue the floor plus a 5x5 grid of pillars, each with a sphere beside it.
fn populate_scene(queue: &mut MeshQueue, meshes: &SceneMeshes) {
    queue.draw(
        meshes.plane,
        Transform::new(),
        Material::new([0.8, 0.8, 0.8], 0.2),
    );

    for x in -2i32..=2 {
        for z in -2i32..=2 {
            let height = 1.0 + ((x * 3 + z * 5).rem_euclid(4)) as f32;
            let position = Vec3::new(x as f32 * 8.0, height * 0.5, z as f32 * 8.0);
            queue.draw(
                meshes.cube,
                Transform::from_position(position)
                    .scale(Vec3::new(1.5, height, 1.5)),
                Material::new([0.9, 0.85, 0.75], 0.5),
            );
            queue.draw(
                meshes.sphere,
                Transform::from_position(Vec3::new(position.x + 4.0, 0.75, position.z + 4.0))
                    .rotation(Quat::from_rotation_y((x + z) as f32))
                    .uniform_scale(1.5),
                Material::new([0.6, 0.7, 0.9], 1.0),
            );
        }
    }
}

/// Fully saturated color for hue `t` in `[0, 1)`.
fn hue(t: f32) -> Vec3 {
    let channel = |offset: f32| {
        let k = (t * 6.0 + offset).rem_euclid(6.0);
        (1.0 - (k.min(4.0 - k).clamp(0.0, 1.0))).clamp(0.0, 1.0)
    };
    Vec3::new(channel(5.0), channel(3.0), channel(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn scene_rests_on_the_floor() {
        let meshes = SceneMeshes {
            cube: MeshId(0),
            sphere: MeshId(1),
            plane: MeshId(2),
        };
        let mut queue = MeshQueue::new();
        populate_scene(&mut queue, &meshes);
        assert_eq!(queue.len(), 1 + 2 * 25);

        let mut heights = Vec::new();
        for draw in queue.draws() {
            let t = draw.transform;
            // unit cube and radius-0.5 sphere, both centered on the origin
            let bottom = t.position.y - t.scale.y * 0.5;
            if draw.mesh == meshes.plane {
                assert_eq!(t.position.y, 0.0);
            } else {
                assert!(bottom.abs() < 1e-6, "{:?} floats at {bottom}", draw.mesh);
            }
            if draw.mesh == meshes.cube {
                heights.push(t.scale.y);
            }
        }
        assert!(heights.iter().all(|h| (1.0..=4.0).contains(h)));
        assert!(heights.iter().any(|h| *h != heights[0]));
    }

    #[test]
    fn random_lights_stay_in_bounds() {
        let mut rng = rng();
        for _ in 0..200 {
            let light = random_light(&mut rng);
            let p = light.position();
            assert!(
                p.cmpge(SCENE_MIN).all() && p.cmple(SCENE_MAX).all(),
                "{p:?}"
            );
            let c = light.color();
            assert!(c.min_element() >= 0.0 && c.max_element() <= 5.0, "{c:?}");
        }
    }

    #[test]
    fn removal_takes_newest_first() {
        let mut manager = LightManager::new();
        let mut rig = LightRig::default();
        rig.add_orbits(&mut manager, 2);
        rig.add_random(&mut manager, &mut rng(), 10);
        assert_eq!(manager.len(), 12);

        assert_eq!(rig.remove(&mut manager, 10), 10);
        assert_eq!(manager.len(), 2);
        let orbiting = |(_, motion): &(LightId, Motion)| matches!(motion, Motion::Orbit { .. });
        assert!(rig.lights.iter().all(orbiting));
    }

    #[test]
    fn remove_all_empties_manager() {
        let mut manager = LightManager::new();
        let mut rig = LightRig::default();
        rig.add_orbits(&mut manager, ORBIT_LIGHTS);
        assert_eq!(rig.remove(&mut manager, usize::MAX), ORBIT_LIGHTS);
        assert!(manager.is_empty());
        assert_eq!(rig.remove(&mut manager, 1), 0);
    }

    #[test]
    fn orbits_keep_their_radius() {
        let mut manager = LightManager::new();
        let mut rig = LightRig::default();
        rig.add_orbits(&mut manager, 3);

        for time in [0.0, 1.3, 17.0] {
            rig.animate(&mut manager, time);
            for (id, motion) in &rig.lights {
                let Motion::Orbit { center, radius, .. } = *motion else {
                    unreachable!()
                };
                let light = manager.get(*id).unwrap();
                let offset = light.position() - center;
                assert!((offset.length() - radius).abs() < 1e-3);
                assert!(offset.y.abs() < 1e-6);
            }
        }
    }

    #[test]
    fn fixed_lights_do_not_move() {
        let mut manager = LightManager::new();
        let mut rig = LightRig::default();
        rig.add_random(&mut manager, &mut rng(), 1);
        let (id, _) = rig.lights[0];
        let before = manager.get(id).unwrap().position();
        rig.animate(&mut manager, 5.0);
        assert_eq!(manager.get(id).unwrap().position(), before);
    }

    #[test]
    fn hue_is_saturated() {
        assert_eq!(hue(0.0), Vec3::new(1.0, 0.0, 0.0));
        for i in 0..12 {
            let c = hue(i as f32 / 12.0);
            assert!((c.max_element() - 1.0).abs() < 1e-5, "{c:?}");
            assert!(c.min_element().abs() < 1e-5, "{c:?}");
        }
    }
}
