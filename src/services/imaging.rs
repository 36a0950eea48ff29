use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::RgbImage;

/// JPEG quality used for annotated output images.
pub const JPEG_QUALITY: u8 = 90;

/// Decode an uploaded payload (any supported format) into 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Encode an image as JPEG at [`JPEG_QUALITY`].
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(EncodeError::Jpeg)?;
    Ok(buf)
}

/// Encode the annotated output the way status replies carry it: base64 JPEG.
pub fn encode_base64_jpeg(image: &RgbImage) -> Result<String, EncodeError> {
    let jpeg = encode_jpeg(image)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
}

/// Lossless encoding used when shipping images to the model server.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_with_encoder(PngEncoder::new(&mut buf))?;
    Ok(buf)
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to encode output image as JPEG: {0}")]
    Jpeg(#[source] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_to_rgb() {
        let src = RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let png = encode_png(&src).unwrap();
        let decoded = decode_rgb(&png).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_rgb(b"definitely not an image").is_err());
    }

    #[test]
    fn test_base64_jpeg_is_decodable() {
        let src = RgbImage::new(8, 8);
        let encoded = encode_base64_jpeg(&src).unwrap();
        let jpeg = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        assert_eq!(decode_rgb(&jpeg).unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn test_jpeg_rejects_oversized_width() {
        let too_wide = RgbImage::new(70_000, 1);
        assert!(encode_jpeg(&too_wide).is_err());
    }
}
