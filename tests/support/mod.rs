#![allow(dead_code)]
pub mod fake_server;
pub mod multipart;

use std::io::Cursor;
use image::{DynamicImage, ImageFormat};

/// A small valid PNG for upload bodies and activation payloads.
pub fn tiny_png() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([12, 200, 90])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}
