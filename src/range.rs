//! The `{location, length}` range type used throughout the public API
//! (spec's `CFRange`-shaped ranges for replace/insert/delete/find/cluster
//! operations).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRange {
    pub location: usize,
    pub length: usize,
}

impl CharRange {
    pub fn new(location: usize, length: usize) -> Self {
        CharRange { location, length }
    }

    pub fn end(&self) -> usize {
        self.location + self.length
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.location && index < self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}
