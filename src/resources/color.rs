//! Color Types
//!
//! - [`Color`]: four `f32` channels, the representation used for uniforms,
//!   clear colors and float pixel access.
//! - [`Color32`]: four normalized `u8` channels, the representation used for
//!   8-bit pixel access.
//!
//! Conversions between the two clamp to `[0, 1]` before quantizing, so
//! `Color32 -> Color -> Color32` is lossless while `Color -> Color32` saturates.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

/// Converts a normalized float to an 8-bit unsigned-normalized value.
#[inline]
#[must_use]
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Converts an 8-bit unsigned-normalized value back to a float in `[0, 1]`.
#[inline]
#[must_use]
pub fn from_unorm8(v: u8) -> f32 {
    f32::from(v) / 255.0
}

#[inline]
fn srgb_channel_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_channel_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const CLEAR: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    #[must_use]
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// sRGB-encoded -> linear. Alpha is never gamma-encoded.
    #[must_use]
    pub fn to_linear(self) -> Self {
        Self::new(
            srgb_channel_to_linear(self.r),
            srgb_channel_to_linear(self.g),
            srgb_channel_to_linear(self.b),
            self.a,
        )
    }

    /// linear -> sRGB-encoded. Alpha is never gamma-encoded.
    #[must_use]
    pub fn to_srgb(self) -> Self {
        Self::new(
            linear_channel_to_srgb(self.r),
            linear_channel_to_srgb(self.g),
            linear_channel_to_srgb(self.b),
            self.a,
        )
    }

    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[must_use]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }
}

impl From<Vec4> for Color {
    fn from(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }
}

impl From<[f32; 4]> for Color {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Color32> for Color {
    fn from(c: Color32) -> Self {
        Self::new(
            from_unorm8(c.r),
            from_unorm8(c.g),
            from_unorm8(c.b),
            from_unorm8(c.a),
        )
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const BLACK: Self = Self::new(0x00, 0x00, 0x00, 0xff);
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff, 0xff);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Color> for Color32 {
    fn from(c: Color) -> Self {
        Self::new(to_unorm8(c.r), to_unorm8(c.g), to_unorm8(c.b), to_unorm8(c.a))
    }
}
