//! Image fixtures shared by the integration tests

#![allow(dead_code)]

use bone_scan::models::job::InferenceParams;
use bone_scan::services::imaging;
use image::{Rgb, RgbImage};

/// Parameters the web front-end sends by default.
pub const DEFAULT_PARAMS: InferenceParams = InferenceParams {
    width: 640,
    height: 640,
    conf: 0.25,
};

pub fn params_with_width(width: u32) -> InferenceParams {
    InferenceParams {
        width,
        ..DEFAULT_PARAMS
    }
}

/// 2x2 all-black RGB image.
pub fn black_2x2() -> RgbImage {
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
}

/// PNG upload payload for a 2x2 black image.
pub fn black_2x2_png() -> Vec<u8> {
    imaging::encode_png(&black_2x2()).expect("encode fixture png")
}

/// A small non-uniform scan-like image, PNG-encoded.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([v, v, v])
    });
    imaging::encode_png(&img).expect("encode fixture png")
}

pub const NOT_AN_IMAGE: &[u8] = b"this is not an image at all";
