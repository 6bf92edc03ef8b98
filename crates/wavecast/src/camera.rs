//! Orbit camera around the origin
//!
//! Controls:
//! - Left drag: orbit
//! - Scroll: zoom

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

/// Highest elevation, just short of looking straight down
const MAX_PITCH: f32 = FRAC_PI_2 - 0.01;

#[derive(Component, Debug, Clone)]
pub struct OrbitCamera {
    /// Distance from the origin
    pub radius: f32,
    /// Rotation around the Y axis, in radians
    pub yaw: f32,
    /// Elevation above the XZ plane, in radians; never below the horizon
    pub pitch: f32,
    pub sensitivity: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            radius: 5.0,
            yaw: 0.0,
            pitch: 0.0,
            sensitivity: 0.3,
            zoom_speed: 0.1,
        }
    }
}

impl OrbitCamera {
    /// Camera transform looking at the origin
    pub fn transform(&self) -> Transform {
        Transform::from_translation(orbit_translation(self.yaw, self.pitch, self.radius))
            .looking_at(Vec3::ZERO, Vec3::Y)
    }

    /// Apply a mouse drag, keeping the camera above the horizon
    pub fn rotate(&mut self, delta: Vec2) {
        let delta = delta * self.sensitivity * 0.01;
        self.yaw -= delta.x;
        self.pitch = (self.pitch + delta.y).clamp(0.0, MAX_PITCH);
    }

    /// Move towards or away from the origin; positive `amount` zooms in
    pub fn zoom(&mut self, amount: f32) {
        self.radius = (self.radius * (1.0 - amount * self.zoom_speed)).clamp(0.1, 1000.0);
    }
}

/// Point at `radius` from the origin for the given yaw and pitch
pub fn orbit_translation(yaw: f32, pitch: f32, radius: f32) -> Vec3 {
    Vec3::new(
        radius * pitch.cos() * yaw.sin(),
        radius * pitch.sin(),
        radius * pitch.cos() * yaw.cos(),
    )
}

pub fn orbit_camera_controller(
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut query: Query<(&mut Transform, &mut OrbitCamera)>,
) {
    let Ok((mut transform, mut orbit)) = query.single_mut() else {
        return;
    };

    let mut changed = false;

    if buttons.pressed(MouseButton::Left) {
        let delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
        if delta != Vec2::ZERO {
            orbit.rotate(delta);
            changed = true;
        }
    } else {
        mouse_motion.clear();
    }

    for wheel in mouse_wheel.read() {
        let lines = match wheel.unit {
            MouseScrollUnit::Line => wheel.y,
            MouseScrollUnit::Pixel => wheel.y / 40.0,
        };
        orbit.zoom(lines);
        changed = true;
    }

    if changed {
        *transform = orbit.transform();
    }
}
