//! Extent Descriptors
//!
//! An [`ExtentDescriptor`] names a contiguous byte range inside an extent
//! file. Higher-level catalogs embed arbitrarily many of these per logical
//! entity: a block blob carries one per block, a queue message carries exactly
//! one. A descriptor stays valid for as long as its extent is present in the
//! extent catalog; the garbage collector never deletes an extent that any
//! live record still points at.

use serde::{Deserialize, Serialize};

/// A byte range within an extent: `count` bytes starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentDescriptor {
    /// Opaque extent identifier assigned by the writer pool at creation.
    pub extent_id: String,

    /// Byte offset of the range within the extent file.
    pub offset: u64,

    /// Number of bytes in the range.
    pub count: u64,
}

impl ExtentDescriptor {
    pub fn new(extent_id: impl Into<String>, offset: u64, count: u64) -> Self {
        Self {
            extent_id: extent_id.into(),
            offset,
            count,
        }
    }

    /// Exclusive end offset of the range.
    pub fn end(&self) -> u64 {
        self.offset + self.count
    }

    /// Whether two descriptors cover overlapping bytes of the same extent.
    pub fn overlaps(&self, other: &ExtentDescriptor) -> bool {
        self.extent_id == other.extent_id && self.offset < other.end() && other.offset < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_is_exclusive() {
        let d = ExtentDescriptor::new("e1", 10, 5);
        assert_eq!(d.end(), 15);
    }

    #[test]
    fn overlap_requires_same_extent() {
        let a = ExtentDescriptor::new("e1", 0, 10);
        let b = ExtentDescriptor::new("e2", 0, 10);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let a = ExtentDescriptor::new("e1", 0, 10);
        let b = ExtentDescriptor::new("e1", 10, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&ExtentDescriptor::new("e1", 9, 1)));
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let d = ExtentDescriptor::new("e1", 42, 7);
        let json = serde_json::to_string(&d).unwrap();
        let back: ExtentDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
