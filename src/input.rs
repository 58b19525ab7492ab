use std::collections::HashSet;

use glam::{Vec2, Vec3};
use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and mouse state for the fly-through camera and the toggle keys.
///
/// Window events update keys, buttons and the cursor; raw device motion is
/// tracked separately so mouse look keeps working while the cursor is grabbed.
#[derive(Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_position: Vec2,
    cursor_delta: Vec2,
    motion: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-frame state. Call after the frame has consumed its input.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.cursor_delta = Vec2::ZERO;
        self.motion = Vec2::ZERO;
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press(key),
                        ElementState::Released => self.release(key),
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.mouse_buttons_down.insert(*button);
                }
                ElementState::Released => {
                    self.mouse_buttons_down.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::Focused(false) => {
                self.keys_down.clear();
                self.mouse_buttons_down.clear();
            }
            _ => {}
        }
    }

    /// Accumulate raw mouse motion, reported even when the cursor is locked.
    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.motion += Vec2::new(delta.0 as f32, delta.1 as f32);
        }
    }

    fn press(&mut self, key: KeyCode) {
        // Auto-repeat arrives as further presses while held.
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    fn release(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    fn move_cursor(&mut self, position: Vec2) {
        self.cursor_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key went down this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    /// Current cursor position in window coordinates.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Cursor movement this frame, in window pixels.
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    /// Raw mouse motion this frame.
    pub fn mouse_motion(&self) -> Vec2 {
        self.motion
    }

    /// Held movement keys as camera-local axes: x right (D/A), y up
    /// (Space or Left Shift / Left Ctrl) and z forward (W/S).
    pub fn movement_axis(&self) -> Vec3 {
        let axis = |pos: &[KeyCode], neg: &[KeyCode]| {
            let held = |keys: &[KeyCode]| keys.iter().any(|k| self.key_down(*k));
            held(pos) as i32 as f32 - held(neg) as i32 as f32
        };
        let up = [KeyCode::Space, KeyCode::ShiftLeft];
        Vec3::new(
            axis(&[KeyCode::KeyD], &[KeyCode::KeyA]),
            axis(&up, &[KeyCode::ControlLeft]),
            axis(&[KeyCode::KeyW], &[KeyCode::KeyS]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_is_pressed_once() {
        let mut input = Input::new();
        input.press(KeyCode::KeyN);
        assert!(input.key_pressed(KeyCode::KeyN));

        input.begin_frame();
        input.press(KeyCode::KeyN);
        assert!(input.key_down(KeyCode::KeyN));
        assert!(!input.key_pressed(KeyCode::KeyN));

        input.release(KeyCode::KeyN);
        input.press(KeyCode::KeyN);
        assert!(input.key_pressed(KeyCode::KeyN));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut input = Input::new();
        input.press(KeyCode::KeyW);
        input.press(KeyCode::KeyD);
        assert_eq!(input.movement_axis(), Vec3::new(1.0, 0.0, 1.0));

        input.press(KeyCode::KeyS);
        input.press(KeyCode::ControlLeft);
        assert_eq!(input.movement_axis(), Vec3::new(1.0, -1.0, 0.0));
    }

    #[test]
    fn either_up_key_counts_once() {
        let mut input = Input::new();
        input.press(KeyCode::Space);
        input.press(KeyCode::ShiftLeft);
        assert_eq!(input.movement_axis(), Vec3::Y);
    }

    #[test]
    fn motion_resets_each_frame() {
        let mut input = Input::new();
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (3.0, -2.0) });
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (1.0, 0.5) });
        input.move_cursor(Vec2::new(10.0, 20.0));
        assert_eq!(input.mouse_motion(), Vec2::new(4.0, -1.5));
        assert_eq!(input.cursor_delta(), Vec2::new(10.0, 20.0));

        input.begin_frame();
        assert_eq!(input.mouse_motion(), Vec2::ZERO);
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Vec2::new(10.0, 20.0));
    }
}
