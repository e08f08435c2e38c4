//! # Variant Value Codec
//!
//! Scalars and vectors that can be carried in more than one wire
//! representation.
//!
//! ## Design Philosophy
//!
//! - Each component is an enum: the discriminant and the raw bits can never
//!   disagree, and every accessor matches exhaustively
//! - Setting one component never touches the others
//! - Conversions are computed on access and never written back
//! - Out-of-range values clamp; nothing here returns an error

mod angles;
mod color;
mod coords;
pub mod scale;
mod small;

pub use angles::{VarAngle, VarAngles};
pub use color::{ColorComp, VarColor, VarFraction};
pub use coords::{MaybeDiffCoords, VarCoord, VarCoords};
pub use small::{
    SmallAngle, SmallAngles, SmallOffset, SmallOffsets, GUNANGLE_SCALE, GUNOFFSET_SCALE,
    KICK_ANGLE_SCALE, VIEWOFFSET_SCALE,
};

/// A vector value plus a bit per component that changed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Delta<V> {
    /// Bit `n` set means component `n` is carried.
    pub delta_bits: u8,
    /// Component values; only flagged components are meaningful.
    pub values: V,
}

impl<V> Delta<V> {
    /// True if no component changed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.delta_bits == 0
    }

    /// True if component `comp` changed.
    #[inline]
    #[must_use]
    pub const fn has(&self, comp: usize) -> bool {
        self.delta_bits & (1 << comp) != 0
    }
}

/// Changed coordinate components.
pub type CoordsDelta = Delta<VarCoords>;
/// Changed angle components.
pub type AnglesDelta = Delta<VarAngles>;
/// Changed small offset components.
pub type SmallOffsetsDelta = Delta<SmallOffsets>;
/// Changed small angle components.
pub type SmallAnglesDelta = Delta<SmallAngles>;
/// Changed color components.
pub type ColorDelta = Delta<VarColor>;

/// Sets bit `n` of the result when `differs(n)` is true, for `n` in `0..count`.
#[inline]
pub(crate) fn component_bits(count: usize, differs: impl Fn(usize) -> bool) -> u8 {
    (0..count)
        .filter(|&comp| differs(comp))
        .fold(0, |bits, comp| bits | (1 << comp))
}
