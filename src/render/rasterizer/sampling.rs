//! Sub-texel sample patterns for antialiased coverage.
//!
//! Offsets are the standard multisample positions, in 1/16 texel units
//! relative to the texel center. A pattern with one sample tests the center.

use super::edgefunction::{FixedPoint, SUBPIXEL_ONE};

const PATTERN_1: [(i8, i8); 1] = [(0, 0)];
const PATTERN_2: [(i8, i8); 2] = [(4, 4), (-4, -4)];
const PATTERN_4: [(i8, i8); 4] = [(-2, -6), (6, -2), (-6, 2), (2, 6)];
const PATTERN_8: [(i8, i8); 8] = [
    (1, -3),
    (-1, 3),
    (5, 1),
    (-3, -5),
    (-5, 5),
    (-7, -1),
    (3, 7),
    (7, -7),
];
const PATTERN_16: [(i8, i8); 16] = [
    (1, 1),
    (-1, -3),
    (-3, 2),
    (4, -1),
    (-5, -2),
    (2, 5),
    (5, 3),
    (3, -5),
    (-2, 6),
    (0, -7),
    (-4, -6),
    (-6, 4),
    (-8, 0),
    (7, -4),
    (6, 7),
    (-7, -8),
];

/// Subpixel units per 1/16 texel step.
const STEP: i64 = SUBPIXEL_ONE / 16;

/// The set of sample positions tested inside every texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePattern {
    offsets: &'static [(i8, i8)],
}

impl SamplePattern {
    pub const SINGLE: SamplePattern = SamplePattern {
        offsets: &PATTERN_1,
    };

    /// Pattern for `samples` per texel, or `None` for unsupported counts.
    pub fn for_count(samples: u32) -> Option<SamplePattern> {
        let offsets: &'static [(i8, i8)] = match samples {
            1 => &PATTERN_1,
            2 => &PATTERN_2,
            4 => &PATTERN_4,
            8 => &PATTERN_8,
            16 => &PATTERN_16,
            _ => return None,
        };
        Some(SamplePattern { offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Fixed-point position of sample `index` inside texel `(x, y)`.
    #[inline]
    pub fn position(&self, x: i32, y: i32, index: usize) -> FixedPoint {
        let (ox, oy) = self.offsets[index];
        FixedPoint::new(
            x as i64 * SUBPIXEL_ONE + SUBPIXEL_ONE / 2 + ox as i64 * STEP,
            y as i64 * SUBPIXEL_ONE + SUBPIXEL_ONE / 2 + oy as i64 * STEP,
        )
    }

    /// Smallest and largest offsets of the pattern in subpixel units, as
    /// `(min_x, min_y, max_x, max_y)` relative to the texel origin.
    pub fn extent(&self) -> (i64, i64, i64, i64) {
        let center = SUBPIXEL_ONE / 2;
        self.offsets.iter().fold(
            (i64::MAX, i64::MAX, i64::MIN, i64::MIN),
            |(min_x, min_y, max_x, max_y), &(ox, oy)| {
                let x = center + ox as i64 * STEP;
                let y = center + oy as i64 * STEP;
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for SamplePattern {
    fn default() -> Self {
        Self::SINGLE
    }
}
