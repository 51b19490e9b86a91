use std::collections::HashSet;

use glam::{Vec2, Vec3};
use parking_lot::RwLock;

use crate::camera::CameraInputs;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }

    /// Maps a winit physical key, ignoring keys no demo listens to.
    pub fn from_winit(code: winit::keyboard::KeyCode) -> Option<Self> {
        use winit::keyboard::KeyCode as Key;
        Some(match code {
            Key::Space => Self::Named(NamedKey::Space),
            Key::Escape => Self::Named(NamedKey::Escape),
            Key::ShiftLeft => Self::Named(NamedKey::LeftShift),
            Key::ShiftRight => Self::Named(NamedKey::RightShift),
            Key::ControlLeft => Self::Named(NamedKey::LeftCtrl),
            Key::ControlRight => Self::Named(NamedKey::RightCtrl),
            Key::ArrowUp => Self::Named(NamedKey::Up),
            Key::ArrowDown => Self::Named(NamedKey::Down),
            Key::ArrowLeft => Self::Named(NamedKey::Left),
            Key::ArrowRight => Self::Named(NamedKey::Right),
            Key::KeyA => Self::Character('A'),
            Key::KeyD => Self::Character('D'),
            Key::KeyE => Self::Character('E'),
            Key::KeyQ => Self::Character('Q'),
            Key::KeyS => Self::Character('S'),
            Key::KeyW => Self::Character('W'),
            _ => return None,
        })
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Escape" | "Esc" => Escape,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Space,
    Escape,
    Left,
    Right,
    Up,
    Down,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn from_winit(button: winit::event::MouseButton) -> Self {
        use winit::event::MouseButton as Button;
        match button {
            Button::Left => Self::LEFT,
            Button::Right => Self::RIGHT,
            Button::Middle => Self::MIDDLE,
            Button::Back => Self(3),
            Button::Forward => Self(4),
            Button::Other(value) => Self(value.min(u8::MAX as u16) as u8),
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Keyboard and mouse snapshot fed by the window event handler.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    mouse_position: RwLock<Vec2>,
    mouse_delta: RwLock<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    pub fn set_mouse_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
    }

    /// Accumulates raw mouse motion until the next [`Self::camera_inputs`].
    pub fn add_mouse_motion(&self, delta: Vec2) {
        *self.mouse_delta.write() += delta;
    }

    /// Drops held keys and buttons, e.g. when the window loses focus.
    pub fn clear(&self) {
        self.keys.write().clear();
        self.mouse_buttons.write().clear();
        *self.mouse_delta.write() = Vec2::ZERO;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    pub fn is_key_down_by_name(&self, name: &str) -> bool {
        KeyCode::from_name(name).is_some_and(|key| self.is_key_down(key))
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse_position.read()
    }

    /// Builds the free-fly controls for this frame and consumes the
    /// accumulated mouse motion. Looking requires the right button.
    pub fn camera_inputs(&self, delta_time: f32) -> CameraInputs {
        let delta = std::mem::take(&mut *self.mouse_delta.write());
        let look_delta = if self.is_mouse_button_down(MouseButton::RIGHT) {
            delta
        } else {
            Vec2::ZERO
        };

        let axis = |positive: &[&str], negative: &[&str]| {
            let pressed = |names: &[&str]| names.iter().any(|name| self.is_key_down_by_name(name));
            pressed(positive) as i32 as f32 - pressed(negative) as i32 as f32
        };
        let movement = Vec3::new(
            axis(&["D", "Right"], &["A", "Left"]),
            axis(&["Space", "E"], &["LeftCtrl", "RightCtrl", "Q"]),
            axis(&["W", "Up"], &["S", "Down"]),
        );

        CameraInputs {
            look_delta,
            movement,
            boost: self.is_key_down_by_name("LeftShift") || self.is_key_down_by_name("RightShift"),
            delta_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Space"),
            Some(KeyCode::Named(NamedKey::Space))
        );
        assert_eq!(KeyCode::from_name("w"), Some(KeyCode::Character('W')));
        assert_eq!(KeyCode::from_name("Tab"), None);
    }

    #[test]
    fn maps_winit_keys() {
        assert_eq!(
            KeyCode::from_winit(winit::keyboard::KeyCode::KeyW),
            Some(KeyCode::Character('W'))
        );
        assert_eq!(
            MouseButton::from_winit(winit::event::MouseButton::Right),
            MouseButton::RIGHT
        );
    }

    #[test]
    fn input_state_tracks_keys() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Named(NamedKey::Space));
        assert!(state.is_key_down_by_name("Space"));
        state.set_key_up(KeyCode::Named(NamedKey::Space));
        assert!(!state.is_key_down_by_name("Space"));
    }

    #[test]
    fn mouse_look_requires_right_button() {
        let state = InputState::new();
        state.add_mouse_motion(Vec2::new(3.0, 1.0));
        assert_eq!(state.camera_inputs(0.1).look_delta, Vec2::ZERO);

        state.set_mouse_button_down(MouseButton::RIGHT);
        state.add_mouse_motion(Vec2::new(3.0, 1.0));
        state.add_mouse_motion(Vec2::new(1.0, 1.0));
        assert_eq!(state.camera_inputs(0.1).look_delta, Vec2::new(4.0, 2.0));
        assert_eq!(state.camera_inputs(0.1).look_delta, Vec2::ZERO);
    }

    #[test]
    fn wasd_builds_movement_axes() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        state.set_key_down(KeyCode::Character('A'));
        state.set_key_down(KeyCode::Named(NamedKey::LeftShift));
        let inputs = state.camera_inputs(0.016);
        assert_eq!(inputs.movement, Vec3::new(-1.0, 0.0, 1.0));
        assert!(inputs.boost);
        assert_eq!(inputs.delta_time, 0.016);

        state.clear();
        assert_eq!(state.camera_inputs(0.016).movement, Vec3::ZERO);
    }
}
