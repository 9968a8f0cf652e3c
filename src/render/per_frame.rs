use std::ops::{Index, IndexMut};

/// Frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 2;

#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameIndex(usize);

impl FrameIndex {
    pub fn new(index: usize) -> FrameIndex {
        assert!(
            index < FRAMES_IN_FLIGHT,
            "Frame index {index} out of range, only {FRAMES_IN_FLIGHT} frames in flight"
        );
        FrameIndex(index)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn all() -> impl Iterator<Item = FrameIndex> {
        (0..FRAMES_IN_FLIGHT).map(FrameIndex)
    }
}

/// One value per frame in flight.
#[derive(Debug, Clone)]
pub struct PerFrame<T>([T; FRAMES_IN_FLIGHT]);

impl<T> PerFrame<T> {
    pub fn from_fn(mut f: impl FnMut(FrameIndex) -> T) -> Self {
        PerFrame(std::array::from_fn(|i| f(FrameIndex(i))))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<FrameIndex> for PerFrame<T> {
    type Output = T;

    fn index(&self, index: FrameIndex) -> &T {
        &self.0[index.0]
    }
}

impl<T> IndexMut<FrameIndex> for PerFrame<T> {
    fn index_mut(&mut self, index: FrameIndex) -> &mut T {
        &mut self.0[index.0]
    }
}
