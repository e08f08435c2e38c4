//! # Scale Factors
//!
//! Fixed-point conversions shared by every variant type. All of them clamp
//! instead of failing; the codec must always produce *some* wire value.

/// Coordinate integer unit: 1/8 world unit.
pub const COORD_SCALE: f32 = 8.0;

/// Multiplies `x` by `scale`, clamps into `[min, max]` and truncates toward zero.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn clamped_mul(x: f32, scale: f32, min: f32, max: f32) -> i32 {
    let scaled = x * scale;
    let scaled = if scaled < min { min } else { scaled };
    let scaled = if scaled > max { max } else { scaled };
    scaled as i32
}

/// Saturates an integer into the `i8` range.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn clip8(value: i32) -> i8 {
    if value < i8::MIN as i32 {
        i8::MIN
    } else if value > i8::MAX as i32 {
        i8::MAX
    } else {
        value as i8
    }
}

/// Saturates an integer into the `i16` range.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn clip16(value: i32) -> i16 {
    if value < i16::MIN as i32 {
        i16::MIN
    } else if value > i16::MAX as i32 {
        i16::MAX
    } else {
        value as i16
    }
}

/// Decodes a coordinate from 1/8 units.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn int_to_coord(value: i32) -> f32 {
    value as f32 * 0.125
}

/// Encodes a coordinate to 1/8 units.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coord_to_int(value: f32) -> i32 {
    clamped_mul(value, COORD_SCALE, i32::MIN as f32, i32::MAX as f32)
}

/// Decodes an angle in degrees from a 16-bit binary angle.
#[inline]
#[must_use]
pub fn short_to_angle(value: i16) -> f32 {
    f32::from(value) * (360.0 / 65536.0)
}

/// Encodes an angle in degrees to a 16-bit binary angle (wrapping).
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn angle_to_short(value: f32) -> i16 {
    let wrapped = ((value * 65536.0 / 360.0) as i32) & 0xffff;
    wrapped as u16 as i16
}

/// Decodes an angle in degrees from an 8-bit binary angle.
#[inline]
#[must_use]
pub fn char_to_angle(value: i8) -> f32 {
    f32::from(value) * (360.0 / 256.0)
}

/// Encodes an angle in degrees to an 8-bit binary angle (wrapping).
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn angle_to_char(value: f32) -> i8 {
    let wrapped = ((value * 256.0 / 360.0) as i32) & 0xff;
    wrapped as u8 as i8
}

/// Decodes a small offset or small angle from quarter units.
#[inline]
#[must_use]
pub fn char_to_quarter(value: i8) -> f32 {
    f32::from(value) * 0.25
}

/// Encodes a small offset or small angle (-32 .. 31.75) to quarter units.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn quarter_to_char(value: f32) -> i8 {
    clamped_mul(value, 4.0, f32::from(i8::MIN), f32::from(i8::MAX)) as i8
}

/// Encodes `value` as a short in units of `1/scale`, saturating.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn scaled_short(value: f32, scale: f32) -> i16 {
    clamped_mul(value, scale, f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Decodes a short stored in units of `1/scale`.
#[inline]
#[must_use]
pub fn short_scaled(value: i16, scale: f32) -> f32 {
    f32::from(value) / scale
}

/// Decodes a color component from a byte.
#[inline]
#[must_use]
pub fn byte_to_color(value: u8) -> f32 {
    f32::from(value) / 255.0
}

/// Encodes a color component (0 .. 1) to a byte.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn color_to_byte(value: f32) -> u8 {
    clamped_mul(value, 255.0, 0.0, 255.0) as u8
}

/// Encodes a value where 0 means "default" so that only a true 0 maps to 0.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn nonzero_byte(value: f32, scale: f32) -> u8 {
    if value == 0.0 {
        0
    } else {
        clamped_mul(value, scale, 1.0, 255.0) as u8
    }
}

/// Encodes an entity loop volume (0 = default) to a byte.
#[inline]
#[must_use]
pub fn loop_volume_to_byte(value: f32) -> u8 {
    nonzero_byte(value, 255.0)
}

/// Encodes an entity alpha (0 = default) to a byte.
#[inline]
#[must_use]
pub fn alpha_to_byte(value: f32) -> u8 {
    nonzero_byte(value, 255.0)
}

/// Encodes an entity scale (0 = default) to a byte in 1/16 units.
#[inline]
#[must_use]
pub fn scale_to_byte(value: f32) -> u8 {
    nonzero_byte(value, 16.0)
}
