//! Keyboard and mouse state for the sandbox's fly camera and scene hotkeys.

use glam::{Vec2, Vec3};
use std::collections::HashSet;

/// Manages input state for the current frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Keys currently held down.
    keys_held: HashSet<KeyCode>,
    /// Keys pressed this frame.
    keys_pressed: HashSet<KeyCode>,
    /// Keys released this frame.
    keys_released: HashSet<KeyCode>,

    /// Mouse movement delta this frame.
    mouse_delta: Vec2,
    /// Accumulated mouse delta (for when cursor is locked).
    accumulated_delta: Vec2,

    /// Last cursor position in window pixels, origin top-left.
    cursor_position: Vec2,

    /// Whether the cursor is captured/locked.
    cursor_locked: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close out a frame: clear pressed/released keys and latch the mouse motion gathered since
    /// the last call.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_delta = self.accumulated_delta;
        self.accumulated_delta = Vec2::ZERO;
    }

    /// Process a keyboard event.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.keys_held.contains(&key) {
                    self.keys_pressed.insert(key);
                }
                self.keys_held.insert(key);
            }
            ElementState::Released => {
                self.keys_held.remove(&key);
                self.keys_released.insert(key);
            }
        }
    }

    /// Process raw mouse movement. Ignored while the cursor is free.
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        if !self.cursor_locked {
            return;
        }
        self.accumulated_delta.x += delta.0 as f32;
        self.accumulated_delta.y += delta.1 as f32;
    }

    /// Check if a key is currently held.
    pub fn process_cursor_position(&mut self, position: (f64, f64)) {
        self.cursor_position = Vec2::new(position.0 as f32, position.1 as f32);
    }

    pub fn cursor_position(&self) -> Vec2 {
        self.cursor_position
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Check if a key was pressed this frame.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Check if a key was released this frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    /// Get the mouse movement delta for this frame.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Check if the cursor is locked.
    pub fn is_cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    /// Set cursor lock state. Unlocking drops any pending mouse motion.
    pub fn set_cursor_locked(&mut self, locked: bool) {
        self.cursor_locked = locked;
        if !locked {
            self.accumulated_delta = Vec2::ZERO;
            self.mouse_delta = Vec2::ZERO;
        }
    }

    /// Fly movement in camera space: x = strafe, y = vertical, z = forward.
    /// Normalized so diagonals are not faster.
    pub fn fly_input(&self) -> Vec3 {
        let mut movement = Vec3::ZERO;

        if self.is_key_held(KeyCode::KeyW) {
            movement.z += 1.0;
        }
        if self.is_key_held(KeyCode::KeyS) {
            movement.z -= 1.0;
        }
        if self.is_key_held(KeyCode::KeyA) {
            movement.x -= 1.0;
        }
        if self.is_key_held(KeyCode::KeyD) {
            movement.x += 1.0;
        }
        if self.is_key_held(KeyCode::Space) {
            movement.y += 1.0;
        }
        if self.is_key_held(KeyCode::ControlLeft) || self.is_key_held(KeyCode::ControlRight) {
            movement.y -= 1.0;
        }

        movement.normalize_or_zero()
    }

    /// Check if boost is held (Shift).
    pub fn is_boosting(&self) -> bool {
        self.is_key_held(KeyCode::ShiftLeft) || self.is_key_held(KeyCode::ShiftRight)
    }

    /// Scene hotkey pressed this frame (Digit1..Digit9 -> 0..8).
    pub fn scene_hotkey(&self) -> Option<usize> {
        const DIGITS: [KeyCode; 9] = [
            KeyCode::Digit1,
            KeyCode::Digit2,
            KeyCode::Digit3,
            KeyCode::Digit4,
            KeyCode::Digit5,
            KeyCode::Digit6,
            KeyCode::Digit7,
            KeyCode::Digit8,
            KeyCode::Digit9,
        ];
        DIGITS.iter().position(|k| self.is_key_pressed(*k))
    }

    /// Check if the wireframe toggle was pressed (F).
    pub fn is_wireframe_toggled(&self) -> bool {
        self.is_key_pressed(KeyCode::KeyF)
    }

    /// Check if cursor release was pressed (Escape).
    pub fn is_release_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::Escape)
    }
}

// Re-export for convenience
pub use winit::event::ElementState;
pub use winit::keyboard::{KeyCode, PhysicalKey};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_position_survives_frames() {
        let mut input = InputState::new();
        assert_eq!(input.cursor_position(), Vec2::ZERO);
        input.process_cursor_position((320.5, 40.0));
        input.begin_frame();
        assert_eq!(input.cursor_position(), Vec2::new(320.5, 40.0));
    }

    #[test]
    fn held_key_is_pressed_only_once() {
        let mut input = InputState::new();
        input.process_keyboard(KeyCode::KeyF, ElementState::Pressed);
        assert!(input.is_wireframe_toggled());
        input.begin_frame();
        // OS key repeat
        input.process_keyboard(KeyCode::KeyF, ElementState::Pressed);
        assert!(!input.is_wireframe_toggled());
        assert!(input.is_key_held(KeyCode::KeyF));
        input.process_keyboard(KeyCode::KeyF, ElementState::Released);
        assert!(input.is_key_released(KeyCode::KeyF));
        assert!(!input.is_key_held(KeyCode::KeyF));
    }

    #[test]
    fn fly_input_is_normalized() {
        let mut input = InputState::new();
        input.process_keyboard(KeyCode::KeyW, ElementState::Pressed);
        input.process_keyboard(KeyCode::KeyD, ElementState::Pressed);
        input.process_keyboard(KeyCode::Space, ElementState::Pressed);
        let v = input.fly_input();
        assert!((v.length() - 1.0).abs() < 1e-6);
        assert!(v.x > 0.0 && v.y > 0.0 && v.z > 0.0);
    }

    #[test]
    fn mouse_motion_needs_locked_cursor() {
        let mut input = InputState::new();
        input.process_mouse_motion((5.0, 3.0));
        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);

        input.set_cursor_locked(true);
        input.process_mouse_motion((5.0, 3.0));
        input.process_mouse_motion((1.0, -1.0));
        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::new(6.0, 2.0));
    }

    #[test]
    fn scene_hotkeys_map_to_indices() {
        let mut input = InputState::new();
        assert_eq!(input.scene_hotkey(), None);
        input.process_keyboard(KeyCode::Digit3, ElementState::Pressed);
        assert_eq!(input.scene_hotkey(), Some(2));
    }
}
