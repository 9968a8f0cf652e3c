use crate::scene::DirtyFlags;

use super::per_frame::FRAMES_IN_FLIGHT;

/// How many more frames still hold a stale copy of some resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateState {
    #[default]
    Clean,
    Pending { remaining: u8 },
}

impl UpdateState {
    pub fn mark(&mut self) {
        *self = UpdateState::Pending {
            remaining: FRAMES_IN_FLIGHT as u8,
        };
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, UpdateState::Pending { .. })
    }

    /// Returns whether the current frame has to be updated, and counts it.
    pub fn consume(&mut self) -> bool {
        match *self {
            UpdateState::Clean => false,
            UpdateState::Pending { remaining } => {
                *self = if remaining <= 1 {
                    UpdateState::Clean
                } else {
                    UpdateState::Pending {
                        remaining: remaining - 1,
                    }
                };
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdates {
    pub camera: UpdateState,
    pub lights: UpdateState,
    pub materials: UpdateState,
    pub textures: UpdateState,
    pub frame_contents: UpdateState,
}

impl PendingUpdates {
    /// Everything starts out stale.
    pub fn new() -> Self {
        let mut pending = UpdateState::Clean;
        pending.mark();
        Self {
            camera: pending,
            lights: pending,
            materials: pending,
            textures: pending,
            frame_contents: pending,
        }
    }

    pub fn apply(&mut self, dirty: DirtyFlags) {
        if dirty.intersects(DirtyFlags::CAMERA_VIEW | DirtyFlags::CAMERA_PROJ) {
            self.camera.mark();
        }
        if dirty.contains(DirtyFlags::LIGHTS) {
            self.lights.mark();
            self.frame_contents.mark();
        }
        if dirty.contains(DirtyFlags::TRANSFORMS) {
            self.frame_contents.mark();
        }
        if dirty.contains(DirtyFlags::MATERIALS) {
            self.materials.mark();
        }
        if dirty.contains(DirtyFlags::TEXTURES) {
            self.textures.mark();
            self.frame_contents.mark();
        }
        if dirty.contains(DirtyFlags::PRIMS) {
            self.frame_contents.mark();
        }
    }

    pub fn is_clean(&self) -> bool {
        [
            self.camera,
            self.lights,
            self.materials,
            self.textures,
            self.frame_contents,
        ]
        .iter()
        .all(|state| !state.is_pending())
    }
}

impl Default for PendingUpdates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_drains_after_frames_in_flight() {
        let mut state = UpdateState::Clean;
        state.mark();
        for _ in 0..FRAMES_IN_FLIGHT {
            assert!(state.consume());
        }
        assert_eq!(state, UpdateState::Clean);
        assert!(!state.consume());
    }

    #[test]
    fn marking_again_restarts_the_countdown() {
        let mut state = UpdateState::Clean;
        state.mark();
        assert!(state.consume());
        state.mark();
        assert_eq!(
            state,
            UpdateState::Pending {
                remaining: FRAMES_IN_FLIGHT as u8
            }
        );
    }

    #[test]
    fn materials_alone_do_not_rerecord() {
        let mut updates = PendingUpdates::new();
        drain(&mut updates);

        updates.apply(DirtyFlags::MATERIALS);
        assert!(updates.materials.is_pending());
        assert!(!updates.frame_contents.is_pending());
        assert!(!updates.textures.is_pending());
    }

    #[test]
    fn flags_map_onto_categories() {
        let mut updates = PendingUpdates::new();
        drain(&mut updates);

        updates.apply(DirtyFlags::CAMERA_PROJ);
        assert!(updates.camera.is_pending());
        assert!(!updates.frame_contents.is_pending());

        drain(&mut updates);
        updates.apply(DirtyFlags::TEXTURES);
        assert!(updates.textures.is_pending());
        assert!(updates.frame_contents.is_pending());

        drain(&mut updates);
        updates.apply(DirtyFlags::TRANSFORMS);
        assert!(updates.frame_contents.is_pending());
        assert!(!updates.lights.is_pending());

        drain(&mut updates);
        updates.apply(DirtyFlags::LIGHTS);
        assert!(updates.lights.is_pending());
        assert!(updates.frame_contents.is_pending());
    }

    fn drain(updates: &mut PendingUpdates) {
        for _ in 0..FRAMES_IN_FLIGHT {
            updates.camera.consume();
            updates.lights.consume();
            updates.materials.consume();
            updates.textures.consume();
            updates.frame_contents.consume();
        }
        assert!(updates.is_clean());
    }
}
