//! # Solid Packing
//!
//! An entity's bounding box squeezed into 16 or 32 bits so clients can
//! predict collisions against it.
//!
//! ## Formats
//!
//! 1. **16-bit**: X/Y symmetric and equal, 8-unit steps
//! 2. **R1Q2 32-bit**: X/Y symmetric and equal, 1-unit steps, tall Z range
//! 3. **Q2PRO v2 32-bit**: X and Y independent, 1-unit steps
//!
//! All three quantize. Unpacking returns exactly the box that packing it
//! again reproduces.

use crate::Vec3;

/// Which solid encoding a connection uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolidFormat {
    /// Original 16-bit encoding.
    Vanilla16,
    /// R1Q2 long solid (protocol 35, revision 1905 and later).
    R1q2Long,
    /// Q2PRO extended v2 encoding.
    Q2proV2,
}

impl SolidFormat {
    /// Packs a bounding box.
    #[must_use]
    pub fn pack(self, mins: Vec3, maxs: Vec3) -> u32 {
        match self {
            Self::Vanilla16 => u32::from(pack_solid_16(mins, maxs)),
            Self::R1q2Long => pack_solid_32_r1q2(mins, maxs),
            Self::Q2proV2 => pack_solid_32_q2pro_v2(mins, maxs),
        }
    }

    /// Unpacks a bounding box as `(mins, maxs)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn unpack(self, solid: u32) -> (Vec3, Vec3) {
        match self {
            Self::Vanilla16 => unpack_solid_16(solid as u16),
            Self::R1q2Long => unpack_solid_32_r1q2(solid),
            Self::Q2proV2 => unpack_solid_32_q2pro_v2(solid),
        }
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(value: f32, min: i32, max: i32) -> u32 {
    // Ranges are non-negative, so the final cast is lossless.
    (value as i32).clamp(min, max) as u32
}

#[inline]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn symmetric_box(x: u32, y: u32, zd: u32, zu: i32) -> (Vec3, Vec3) {
    let (x, y, zd) = (x as f32, y as f32, zd as f32);
    ([-x, -y, -zd], [x, y, zu as f32])
}

/// Packs a box into 16 bits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pack_solid_16(mins: Vec3, maxs: Vec3) -> u16 {
    let x = quantize(maxs[0] / 8.0, 1, 31);
    let zd = quantize(-mins[2] / 8.0, 1, 31);
    let zu = quantize((maxs[2] + 32.0) / 8.0, 1, 63);
    ((zu << 10) | (zd << 5) | x) as u16
}

/// Unpacks a 16-bit solid into `(mins, maxs)`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unpack_solid_16(solid: u16) -> (Vec3, Vec3) {
    let solid = u32::from(solid);
    let x = 8 * (solid & 31);
    let zd = 8 * ((solid >> 5) & 31);
    let zu = 8 * ((solid >> 10) & 63) as i32 - 32;
    symmetric_box(x, x, zd, zu)
}

/// Packs a box into the R1Q2 32-bit format.
#[must_use]
pub fn pack_solid_32_r1q2(mins: Vec3, maxs: Vec3) -> u32 {
    let x = quantize(maxs[0], 1, 255);
    let zd = quantize(-mins[2], 0, 255);
    let zu = quantize(maxs[2] + 32768.0, 0, 65535);
    (zu << 16) | (zd << 8) | x
}

/// Unpacks an R1Q2 32-bit solid into `(mins, maxs)`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unpack_solid_32_r1q2(solid: u32) -> (Vec3, Vec3) {
    let x = solid & 255;
    let zd = (solid >> 8) & 255;
    let zu = ((solid >> 16) & 65535) as i32 - 32768;
    symmetric_box(x, x, zd, zu)
}

/// Packs a box into the Q2PRO v2 32-bit format.
#[must_use]
pub fn pack_solid_32_q2pro_v2(mins: Vec3, maxs: Vec3) -> u32 {
    let x = quantize(maxs[0], 1, 255);
    let y = quantize(maxs[1], 1, 255);
    let zd = quantize(-mins[2], 0, 255);
    let zu = quantize(maxs[2] + 32.0, 0, 255);
    (zu << 24) | (zd << 16) | (y << 8) | x
}

/// Unpacks a Q2PRO v2 32-bit solid into `(mins, maxs)`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unpack_solid_32_q2pro_v2(solid: u32) -> (Vec3, Vec3) {
    let x = solid & 255;
    let y = (solid >> 8) & 255;
    let zd = (solid >> 16) & 255;
    let zu = ((solid >> 24) & 255) as i32 - 32;
    symmetric_box(x, y, zd, zu)
}
