//! Binary encodings of images and text used by rows and JSON dumps.

use crate::common::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use image::ImageOutputFormat;
use std::io::{Read, Write};

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = vec![];
    image
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .context("failed to encode the image as PNG")?;
    Ok(bytes)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).context("failed to decode the image")?;
    Ok(image)
}

pub fn image_to_base64(image: &DynamicImage) -> Result<String> {
    Ok(STANDARD.encode(encode_png(image)?))
}

pub fn base64_to_image(text: &str) -> Result<DynamicImage> {
    decode_image(&base64_to_bytes(text)?)
}

pub fn bytes_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn base64_to_bytes(text: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|err| DataModelError::validation("base64", err))?;
    Ok(bytes)
}

pub fn compress_string(text: &str) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(vec![], Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?)
}

pub fn decompress_string(bytes: &[u8]) -> Result<String> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .context("failed to decompress the text")?;
    Ok(text)
}
