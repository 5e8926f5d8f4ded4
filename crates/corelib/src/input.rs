//! Discrete key events to camera/model angle updates.
//!
//! Every key-down event (OS key repeat included) applies one fixed step for
//! each held action key, so holding a key keeps turning. Angles are wrapped
//! by [`TransformState`], which keeps unbounded repeat safe.

use crate::{ShadingMode, TransformState};

/// Model yaw per key event, degrees.
pub const YAW_STEP_DEG: f32 = 1.0;
/// Camera orbit per key event, radians.
pub const ORBIT_STEP_RAD: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewerKey {
    YawLeft,
    YawRight,
    OrbitUp,
    OrbitDown,
    Select(ShadingMode),
}

#[derive(Clone, Debug)]
pub struct InputController {
    yaw_left: bool,
    yaw_right: bool,
    orbit_up: bool,
    orbit_down: bool,
    mode: Option<ShadingMode>,
    yaw_step_deg: f32,
    orbit_step_rad: f32,
}

impl InputController {
    pub fn new(mode: Option<ShadingMode>) -> Self {
        Self {
            yaw_left: false,
            yaw_right: false,
            orbit_up: false,
            orbit_down: false,
            mode,
            yaw_step_deg: YAW_STEP_DEG,
            orbit_step_rad: ORBIT_STEP_RAD,
        }
    }

    /// Record the press and apply one step for every held action key.
    /// Yaw-left wins over yaw-right and orbit-up over orbit-down.
    pub fn key_down(&mut self, key: ViewerKey, state: &mut TransformState) {
        match key {
            ViewerKey::Select(mode) => {
                if self.mode != Some(mode) {
                    log::info!("Shading mode: {mode}");
                }
                self.mode = Some(mode);
                return;
            }
            other => self.set_pressed(other, true),
        }

        if self.yaw_left {
            state.add_yaw(-self.yaw_step_deg);
        } else if self.yaw_right {
            state.add_yaw(self.yaw_step_deg);
        }

        if self.orbit_up {
            state.apply_orbit(-self.orbit_step_rad);
        } else if self.orbit_down {
            state.apply_orbit(self.orbit_step_rad);
        }
    }

    pub fn key_up(&mut self, key: ViewerKey) {
        self.set_pressed(key, false);
    }

    /// Drop all held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.yaw_left = false;
        self.yaw_right = false;
        self.orbit_up = false;
        self.orbit_down = false;
    }

    fn set_pressed(&mut self, key: ViewerKey, pressed: bool) {
        match key {
            ViewerKey::YawLeft => self.yaw_left = pressed,
            ViewerKey::YawRight => self.yaw_right = pressed,
            ViewerKey::OrbitUp => self.orbit_up = pressed,
            ViewerKey::OrbitDown => self.orbit_down = pressed,
            ViewerKey::Select(_) => {}
        }
    }

    pub fn mode(&self) -> Option<ShadingMode> {
        self.mode
    }

    pub fn is_pressed(&self, key: ViewerKey) -> bool {
        match key {
            ViewerKey::YawLeft => self.yaw_left,
            ViewerKey::YawRight => self.yaw_right,
            ViewerKey::OrbitUp => self.orbit_up,
            ViewerKey::OrbitDown => self.orbit_down,
            ViewerKey::Select(mode) => self.mode == Some(mode),
        }
    }
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(Some(ShadingMode::default()))
    }
}
