//! Progressive accumulation state machine.
//!
//! Two images alternate roles every dispatch: the kernel reads the running
//! average from one and writes the updated average into the other. The
//! sample counter is the blend weight, `(prev * n + sample) / (n + 1)`.
//!
//! ```text
//!            reset / camera moved
//!     +-------------------------------+
//!     v                               |
//!   Cold --finish_dispatch--> Accumulating --finish_dispatch--+
//!                                  ^                          |
//!                                  +--------------------------+
//! ```

use crate::editor::Invalidation;
use crate::util::{Mat4, Vec3};

/// Minimum position change that counts as camera movement.
const POS_EPS: f32 = 1e-5;
/// Minimum change of any view matrix element that counts as movement.
const VIEW_EPS: f32 = 1e-6;

/// Camera pose fingerprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub view: Mat4,
}

impl CameraPose {
    pub fn new(position: Vec3, view: Mat4) -> Self {
        Self { position, view }
    }

    /// True when the poses differ beyond the movement epsilons.
    pub fn differs(&self, other: &Self) -> bool {
        (self.position - other.position).abs().max_element() > POS_EPS
            || self
                .view
                .to_cols_array()
                .iter()
                .zip(other.view.to_cols_array().iter())
                .any(|(a, b)| (a - b).abs() > VIEW_EPS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No sample in the history; the next dispatch ignores the read image.
    Cold,
    Accumulating,
}

/// Image roles for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSlot {
    /// Samples already in the read image (0 when cold).
    pub sample_index: u32,
    /// Image holding the running average.
    pub read: usize,
    /// Image receiving the new average.
    pub write: usize,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    phase: Phase,
    samples: u32,
    pose: Option<CameraPose>,
    /// Image holding the most recent result.
    latest: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            phase: Phase::Cold,
            samples: 0,
            pose: None,
            latest: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Accumulated samples.
    pub fn sample_count(&self) -> u32 {
        self.samples
    }

    /// Index of the image with the latest result.
    pub fn latest(&self) -> usize {
        self.latest
    }

    /// Drop the history.
    pub fn reset(&mut self) {
        if self.samples > 0 {
            tracing::trace!("accumulation reset after {} samples", self.samples);
        }
        self.samples = 0;
        self.phase = Phase::Cold;
    }

    /// Apply a scene invalidation. Anything but `Clean` drops the history.
    /// Returns true when it did.
    pub fn apply(&mut self, invalidation: Invalidation) -> bool {
        match invalidation {
            Invalidation::Clean => false,
            Invalidation::Reset | Invalidation::Retransform | Invalidation::Rebuild => {
                self.reset();
                true
            }
        }
    }

    /// Record the current camera pose; resets and returns true when it moved.
    pub fn observe_camera(&mut self, pose: CameraPose) -> bool {
        let moved = self.pose.map_or(true, |prev| prev.differs(&pose));
        if moved {
            self.pose = Some(pose);
            self.reset();
        }
        moved
    }

    /// Image roles for the next dispatch.
    pub fn begin_dispatch(&self) -> DispatchSlot {
        DispatchSlot {
            sample_index: self.samples,
            read: self.latest,
            write: 1 - self.latest,
        }
    }

    /// Commit a finished dispatch: count the sample and swap images.
    pub fn finish_dispatch(&mut self) {
        self.samples = self.samples.saturating_add(1);
        self.latest = 1 - self.latest;
        self.phase = Phase::Accumulating;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(x: f32) -> CameraPose {
        let position = Vec3::new(x, 0.0, 10.0);
        CameraPose::new(position, Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y))
    }

    #[test]
    fn test_counter_and_swap() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.phase(), Phase::Cold);

        for n in 0..4 {
            let slot = acc.begin_dispatch();
            assert_eq!(slot.sample_index, n);
            assert_ne!(slot.read, slot.write);
            acc.finish_dispatch();
            // What was written becomes the next read source.
            assert_eq!(acc.begin_dispatch().read, slot.write);
        }
        assert_eq!(acc.sample_count(), 4);
        assert_eq!(acc.phase(), Phase::Accumulating);
    }

    #[test]
    fn test_camera_motion_resets() {
        let mut acc = Accumulator::new();
        assert!(acc.observe_camera(pose(0.0)));
        acc.finish_dispatch();
        acc.finish_dispatch();

        assert!(!acc.observe_camera(pose(0.0)));
        assert_eq!(acc.sample_count(), 2);

        assert!(acc.observe_camera(pose(0.5)));
        assert_eq!(acc.sample_count(), 0);
        assert_eq!(acc.phase(), Phase::Cold);
    }

    #[test]
    fn test_tiny_jitter_ignored() {
        let a = pose(0.0);
        let mut b = a;
        b.position.x += 1e-7;
        assert!(!a.differs(&b));
    }

    #[test]
    fn test_invalidations_reset_counter() {
        for (invalidation, resets) in [
            (Invalidation::Clean, false),
            (Invalidation::Reset, true),
            (Invalidation::Retransform, true),
            (Invalidation::Rebuild, true),
        ] {
            let mut acc = Accumulator::new();
            acc.observe_camera(pose(0.0));
            for _ in 0..3 {
                acc.finish_dispatch();
            }

            assert_eq!(acc.apply(invalidation), resets, "{invalidation:?}");
            let expected = if resets { 0 } else { 3 };
            assert_eq!(acc.sample_count(), expected, "{invalidation:?}");
            assert_eq!(acc.begin_dispatch().sample_index, expected);
        }
    }

    #[test]
    fn test_reset_keeps_latest_image() {
        let mut acc = Accumulator::new();
        acc.finish_dispatch();
        let latest = acc.latest();
        acc.reset();
        assert_eq!(acc.latest(), latest);
        assert_eq!(acc.begin_dispatch().sample_index, 0);
    }
}
