//! Strongly typed, zero-cost identifier wrappers.
//!
//! All ids are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  Ids are dense: builders hand them
//! out sequentially from 0, so `id.index()` is a direct index into the owning
//! manager's arena `Vec`.

use std::fmt;

/// Generate a typed id wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid id" — equivalent to `u32::MAX`.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as an arena index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized ids are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }
    };
}

typed_id! {
    /// Index of a lane in the map arena.
    pub struct LaneId(u32);
}

typed_id! {
    /// Index of a road in the map arena.
    pub struct RoadId(u32);
}

typed_id! {
    /// Index of a junction in the map arena.
    pub struct JunctionId(u32);
}

typed_id! {
    /// Index of an area of interest in the map arena.
    pub struct AoiId(u32);
}

typed_id! {
    /// Index of a person in the person arena.
    pub struct PersonId(u32);
}
