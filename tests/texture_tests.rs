//! Texture Tests
//!
//! Tests for:
//! - Color / Color32: unorm8 clamping, sRGB <-> linear conversion
//! - Texture2D: default content, pixel round-trips per format, copy-on-write
//! - Texture2D GPU mirror: upload only on token change, sampler-only refresh
//! - Cubemap: face storage, defaults, upload of all six faces

mod common;

use glam::UVec2;

use myth_gl::renderer::device::{DeviceCommand, InternalFormat, SamplerFilter, SamplerWrap, TextureTarget};
use myth_gl::resources::color::{from_unorm8, to_unorm8};
use myth_gl::{
    Color, Color32, ColorSpace, Cubemap, CubemapFace, Texture2D, TextureFilterMode, TextureFormat,
    TextureWrapMode,
};

fn texture(dims: (u32, u32), format: TextureFormat) -> Texture2D {
    Texture2D::new(
        UVec2::new(dims.0, dims.1),
        format,
        ColorSpace::Srgb,
        TextureWrapMode::Repeat,
        TextureFilterMode::Nearest,
    )
}

fn four_colors() -> Vec<Color> {
    vec![
        Color::new(1.0, 0.0, 0.0, 1.0),
        Color::new(0.0, 1.0, 0.0, 0.5),
        Color::new(0.0, 0.0, 1.0, 0.0),
        Color::new(1.0, 1.0, 1.0, 1.0),
    ]
}

// ============================================================================
// Color Tests
// ============================================================================

#[test]
fn unorm8_clamps_out_of_range_values() {
    assert_eq!(to_unorm8(-0.5), 0);
    assert_eq!(to_unorm8(1.5), 255);
    assert_eq!(to_unorm8(0.5), 128);
    assert_eq!(from_unorm8(255), 1.0);
}

#[test]
fn color32_round_trips_through_color() {
    let c = Color32::new(12, 34, 56, 78);
    assert_eq!(Color32::from(Color::from(c)), c);
}

#[test]
fn srgb_linear_conversion_round_trips() {
    let c = Color::new(0.2, 0.5, 0.8, 0.3);
    let back = c.to_linear().to_srgb();
    assert!((back.r - c.r).abs() < 1e-5);
    assert!((back.g - c.g).abs() < 1e-5);
    assert!((back.b - c.b).abs() < 1e-5);
    assert_eq!(back.a, c.a);
}

#[test]
fn to_linear_keeps_endpoints_and_alpha() {
    let linear = Color::new(1.0, 0.0, 0.5, 0.25).to_linear();
    assert_eq!(linear.r, 1.0);
    assert_eq!(linear.g, 0.0);
    assert!(linear.b < 0.5);
    assert_eq!(linear.a, 0.25);
}

// ============================================================================
// Texture2D CPU Tests
// ============================================================================

#[test]
fn new_texture_is_filled_with_0xff() {
    let t = texture((3, 2), TextureFormat::Rgba32);
    assert_eq!(t.pixel_data().len(), 3 * 2 * 4);
    assert!(t.pixel_data().iter().all(|&b| b == 0xff));
    assert!(t.pixels().iter().all(|&c| c == Color::WHITE));
}

#[test]
#[should_panic(expected = "non-zero")]
fn zero_sized_texture_is_rejected() {
    let _ = texture((0, 4), TextureFormat::Rgba32);
}

#[test]
fn rgba32_pixels_round_trip() {
    let mut t = texture((2, 2), TextureFormat::Rgba32);
    t.set_pixels(&four_colors());
    assert_eq!(t.pixels(), four_colors());
}

#[test]
fn rgba_float_pixels_round_trip_losslessly() {
    let colors = vec![
        Color::new(0.1, 2.5, -3.0, 0.7),
        Color::new(100.0, 0.0, 0.333, 1.0),
    ];
    let mut t = texture((2, 1), TextureFormat::RgbaFloat);
    t.set_pixels(&colors);
    assert_eq!(t.pixels(), colors);
}

#[test]
fn rgb_float_drops_alpha() {
    let mut t = texture((1, 1), TextureFormat::RgbFloat);
    t.set_pixels(&[Color::new(0.25, 0.5, 0.75, 0.1)]);
    assert_eq!(t.pixels(), vec![Color::new(0.25, 0.5, 0.75, 1.0)]);
    assert_eq!(t.pixel_data().len(), 12);
}

#[test]
fn rgb24_drops_alpha_and_stores_three_bytes() {
    let mut t = texture((2, 1), TextureFormat::Rgb24);
    t.set_pixels32(&[Color32::new(1, 2, 3, 4), Color32::new(5, 6, 7, 8)]);
    assert_eq!(t.pixel_data(), &[1, 2, 3, 5, 6, 7]);
    assert_eq!(t.pixels32(), vec![Color32::new(1, 2, 3, 255), Color32::new(5, 6, 7, 255)]);
}

#[test]
fn r8_reads_back_red_only() {
    let mut t = texture((2, 1), TextureFormat::R8);
    t.set_pixels(&[Color::new(1.0, 0.5, 0.5, 0.5), Color::new(0.0, 1.0, 1.0, 1.0)]);
    assert_eq!(t.pixel_data(), &[255, 0]);
    assert_eq!(t.pixels(), vec![Color::new(1.0, 0.0, 0.0, 1.0), Color::new(0.0, 0.0, 0.0, 1.0)]);
}

#[test]
fn uint8_formats_clamp_out_of_range_colors() {
    let mut t = texture((1, 1), TextureFormat::Rgba32);
    t.set_pixels(&[Color::new(2.0, -1.0, 0.5, 1.0)]);
    assert_eq!(t.pixels32(), vec![Color32::new(255, 0, 128, 255)]);
}

#[test]
#[should_panic(expected = "number of pixels")]
fn set_pixels_with_wrong_count_panics() {
    let mut t = texture((2, 2), TextureFormat::Rgba32);
    t.set_pixels(&[Color::RED]);
}

#[test]
fn pixel_alignment_follows_row_packing() {
    assert_eq!(TextureFormat::R8.pixel_alignment(), 1);
    assert_eq!(TextureFormat::Rgb24.pixel_alignment(), 1);
    assert_eq!(TextureFormat::Rgba32.pixel_alignment(), 4);
    assert_eq!(TextureFormat::RgbFloat.pixel_alignment(), 4);
    assert_eq!(TextureFormat::RgbaFloat.bytes_per_pixel(), 16);
}

#[test]
fn clones_are_copy_on_write() {
    let mut a = texture((1, 1), TextureFormat::Rgba32);
    let b = a.clone();
    assert_eq!(a, b);

    a.set_pixels(&[Color::RED]);
    assert_ne!(a, b);
    assert_eq!(b.pixels(), vec![Color::WHITE]);
    assert_eq!(a.pixels(), vec![Color::RED]);
}

#[test]
fn resize_reallocates_and_renews_version() {
    let mut t = texture((1, 1), TextureFormat::Rgba32);
    let before = t.version();
    t.resize(UVec2::new(4, 2));
    assert_eq!(t.dimensions(), UVec2::new(4, 2));
    assert_eq!(t.pixel_data().len(), 32);
    assert_ne!(t.version(), before);
}

#[test]
fn per_axis_wrap_modes() {
    let mut t = texture((1, 1), TextureFormat::Rgba32);
    t.set_wrap_mode_v(TextureWrapMode::Mirror);
    assert_eq!(t.wrap_mode_u(), TextureWrapMode::Repeat);
    assert_eq!(t.wrap_mode_v(), TextureWrapMode::Mirror);
    t.set_wrap_mode(TextureWrapMode::Clamp);
    assert_eq!(t.wrap_mode_w(), TextureWrapMode::Clamp);
    assert_eq!(t.wrap_mode_v(), TextureWrapMode::Clamp);
}

// ============================================================================
// Texture2D GPU Mirror Tests
// ============================================================================

#[test]
fn upload_happens_only_when_the_token_changes() {
    let (device, ctx) = common::headless_context();
    let mut t = texture((2, 2), TextureFormat::Rgba32);
    t.set_pixels32(&[
        Color32::new(255, 0, 0, 255),
        Color32::new(0, 255, 0, 255),
        Color32::new(0, 0, 255, 255),
        Color32::WHITE,
    ]);

    let id = t.gpu_handle(&ctx).unwrap();
    assert_eq!(device.image_uploads(id), 1);

    let again = t.gpu_handle(&ctx).unwrap();
    assert_eq!(again, id);
    assert_eq!(device.image_uploads(id), 1);

    t.set_pixels32(&[Color32::BLACK; 4]);
    let after = t.gpu_handle(&ctx).unwrap();
    assert_eq!(after, id);
    assert_eq!(device.image_uploads(id), 2);
}

#[test]
fn upload_uses_colorspace_format_and_alignment() {
    let (device, ctx) = common::headless_context();
    let srgb = texture((3, 1), TextureFormat::Rgb24);
    let linear = Texture2D::new(
        UVec2::new(3, 1),
        TextureFormat::Rgb24,
        ColorSpace::Linear,
        TextureWrapMode::Repeat,
        TextureFilterMode::Nearest,
    );
    srgb.gpu_handle(&ctx).unwrap();
    linear.gpu_handle(&ctx).unwrap();

    let uploads: Vec<_> = device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::UploadImage {
                internal_format,
                unpack_alignment,
                target,
                ..
            } => Some((internal_format, unpack_alignment, target)),
            _ => None,
        })
        .collect();
    assert_eq!(
        uploads,
        vec![
            (InternalFormat::Srgb8, 1, TextureTarget::Texture2D),
            (InternalFormat::Rgb8, 1, TextureTarget::Texture2D),
        ]
    );
}

#[test]
fn sampler_change_refreshes_params_without_reupload() {
    let (device, ctx) = common::headless_context();
    let mut t = texture((1, 1), TextureFormat::Rgba32);
    let id = t.gpu_handle(&ctx).unwrap();
    device.clear_commands();

    t.set_filter_mode(TextureFilterMode::Mipmap);
    t.set_wrap_mode_u(TextureWrapMode::Clamp);
    assert_eq!(t.gpu_handle(&ctx).unwrap(), id);

    assert_eq!(device.image_uploads(id), 0);
    let params: Vec<_> = device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::SetSamplerParams { params, .. } => Some(params),
            _ => None,
        })
        .collect();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].min_filter, SamplerFilter::LinearMipmapLinear);
    assert_eq!(params[0].wrap[0], SamplerWrap::ClampToEdge);
    assert_eq!(params[0].wrap[1], SamplerWrap::Repeat);
}

#[test]
fn dropping_the_last_handle_releases_the_gpu_texture() {
    let (device, ctx) = common::headless_context();
    let live = device.live_objects();
    let t = texture((1, 1), TextureFormat::Rgba32);
    let alias = t.clone();
    t.gpu_handle(&ctx).unwrap();
    assert_eq!(device.live_objects(), live + 1);

    drop(t);
    assert_eq!(device.live_objects(), live + 1);
    drop(alias);
    assert_eq!(device.live_objects(), live);
}

// ============================================================================
// Cubemap Tests
// ============================================================================

#[test]
fn cubemap_defaults() {
    let c = Cubemap::new(4, TextureFormat::Rgba32);
    assert_eq!(c.width(), 4);
    assert_eq!(c.wrap_mode(), TextureWrapMode::Clamp);
    assert_eq!(c.filter_mode(), TextureFilterMode::Mipmap);
    for face in CubemapFace::ALL {
        assert_eq!(c.pixel_data(face).len(), 4 * 4 * 4);
    }
}

#[test]
fn cubemap_faces_are_independent() {
    let mut c = Cubemap::new(1, TextureFormat::Rgba32);
    c.set_pixel_data(CubemapFace::NegativeY, &[1, 2, 3, 4]);
    assert_eq!(c.pixel_data(CubemapFace::NegativeY), &[1, 2, 3, 4]);
    assert_eq!(c.pixel_data(CubemapFace::PositiveY), &[0, 0, 0, 0]);
}

#[test]
#[should_panic(expected = "positive number")]
fn cubemap_width_must_be_positive() {
    let _ = Cubemap::new(0, TextureFormat::Rgba32);
}

#[test]
#[should_panic(expected = "incorrect number of bytes")]
fn cubemap_face_size_is_checked() {
    let mut c = Cubemap::new(2, TextureFormat::Rgba32);
    c.set_pixel_data(CubemapFace::PositiveX, &[0; 4]);
}

#[test]
fn cubemap_uploads_six_srgb_faces() {
    let (device, ctx) = common::headless_context();
    let c = Cubemap::new(2, TextureFormat::Rgb24);
    let id = c.gpu_handle(&ctx).unwrap();
    assert_eq!(device.image_uploads(id), 6);

    let faces: Vec<_> = device
        .commands()
        .into_iter()
        .filter_map(|cmd| match cmd {
            DeviceCommand::UploadImage {
                target: TextureTarget::CubemapFace(face),
                internal_format,
                ..
            } => Some((face, internal_format)),
            _ => None,
        })
        .collect();
    assert_eq!(faces, (0..6).map(|f| (f, InternalFormat::Srgb8)).collect::<Vec<_>>());

    c.gpu_handle(&ctx).unwrap();
    assert_eq!(device.image_uploads(id), 6);
}
