//! Edge-triggered invalidation signals between scene edits and the renderer.
//!
//! - `geometry`: the set of flattened triangles changed shape (add, remove,
//!   clear, load). The renderer re-flattens, reallocates the triangle buffer
//!   and resets accumulation.
//! - `accumulation`: anything else that changes the image (materials,
//!   analytic primitives, bounce depth). The renderer resets accumulation.
//! - `triangles_moved`: qualifies `accumulation` when a flattened instance
//!   was transformed. The renderer re-flattens and writes the triangle
//!   buffer in place before resetting.
//!
//! Each signal reads once and clears itself.

/// What the renderer has to do this frame, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Invalidation {
    #[default]
    Clean,
    /// Reset accumulation.
    Reset,
    /// Re-flatten, write triangles in place, reset.
    Retransform,
    /// Re-flatten, reallocate triangles, reset.
    Rebuild,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyTracker {
    geometry: bool,
    accumulation: bool,
    triangles_moved: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_geometry(&mut self) {
        self.geometry = true;
    }

    pub fn mark_accumulation(&mut self) {
        self.accumulation = true;
    }

    /// A flattened instance moved: accumulation plus an in-place rewrite.
    pub fn mark_triangles_moved(&mut self) {
        self.accumulation = true;
        self.triangles_moved = true;
    }

    /// True when no signal is pending.
    pub fn is_clean(&self) -> bool {
        !(self.geometry || self.accumulation || self.triangles_moved)
    }

    /// Read and clear the geometry signal.
    pub fn take_geometry(&mut self) -> bool {
        std::mem::take(&mut self.geometry)
    }

    /// Read and clear the accumulation signal and its qualifier.
    ///
    /// Returns [`Invalidation::Retransform`] when a flattened instance moved,
    /// [`Invalidation::Reset`] for any other pending change, otherwise
    /// [`Invalidation::Clean`].
    pub fn take_accumulation(&mut self) -> Invalidation {
        let moved = std::mem::take(&mut self.triangles_moved);
        match (std::mem::take(&mut self.accumulation), moved) {
            (_, true) => Invalidation::Retransform,
            (true, false) => Invalidation::Reset,
            (false, false) => Invalidation::Clean,
        }
    }

    /// Consume every signal and report the strongest.
    pub fn take(&mut self) -> Invalidation {
        let result = if self.geometry {
            Invalidation::Rebuild
        } else if self.triangles_moved {
            Invalidation::Retransform
        } else if self.accumulation {
            Invalidation::Reset
        } else {
            Invalidation::Clean
        };
        *self = Self::default();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_once() {
        let mut d = DirtyTracker::new();
        d.mark_geometry();
        assert!(d.take_geometry());
        assert!(!d.take_geometry());

        d.mark_accumulation();
        assert_eq!(d.take_accumulation(), Invalidation::Reset);
        assert_eq!(d.take_accumulation(), Invalidation::Clean);
        assert!(d.is_clean());
    }

    #[test]
    fn test_signals_independent() {
        let mut d = DirtyTracker::new();
        d.mark_geometry();
        assert_eq!(d.take_accumulation(), Invalidation::Clean);
        assert!(d.take_geometry());
    }

    #[test]
    fn test_accumulation_reports_moved_triangles() {
        let mut d = DirtyTracker::new();
        d.mark_triangles_moved();
        assert!(!d.take_geometry());
        assert_eq!(d.take_accumulation(), Invalidation::Retransform);
        assert!(d.is_clean());
        assert_eq!(d.take(), Invalidation::Clean);
    }

    #[test]
    fn test_strongest_wins() {
        let mut d = DirtyTracker::new();
        assert_eq!(d.take(), Invalidation::Clean);

        d.mark_accumulation();
        assert_eq!(d.take(), Invalidation::Reset);

        d.mark_accumulation();
        d.mark_triangles_moved();
        assert_eq!(d.take(), Invalidation::Retransform);

        d.mark_triangles_moved();
        d.mark_geometry();
        assert_eq!(d.take(), Invalidation::Rebuild);
        assert!(d.is_clean());
    }

    #[test]
    fn test_ordering() {
        assert!(Invalidation::Rebuild > Invalidation::Retransform);
        assert!(Invalidation::Retransform > Invalidation::Reset);
        assert!(Invalidation::Reset > Invalidation::Clean);
    }
}
