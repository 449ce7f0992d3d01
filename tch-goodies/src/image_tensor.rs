//! Conversions between decoded images and channel-first tensors.

use crate::{common::*, tensor::TensorExt};

pub trait IntoTensor {
    fn into_tensor(self) -> Tensor;
}

impl<P, Container> IntoTensor for &ImageBuffer<P, Container>
where
    P: Pixel + 'static,
    P::Subpixel: 'static + Element,
    Container: Deref<Target = [P::Subpixel]>,
{
    /// Produces a `[channels, height, width]` tensor with the subpixel dtype.
    fn into_tensor(self) -> Tensor {
        let (width, height) = self.dimensions();
        let channels = P::CHANNEL_COUNT as usize;
        let plane = width as usize * height as usize;

        let mut buffer: Vec<P::Subpixel> = Vec::with_capacity(channels * plane);
        (0..channels).for_each(|c| {
            buffer.extend(self.pixels().map(|pixel| pixel.channels()[c]));
        });

        Tensor::of_slice(&buffer).view([channels as i64, height as i64, width as i64])
    }
}

pub trait TryIntoTensor {
    type Error;

    fn try_into_tensor(self) -> Result<Tensor, Self::Error>;
}

impl TryIntoTensor for &DynamicImage {
    type Error = Error;

    fn try_into_tensor(self) -> Result<Tensor, Self::Error> {
        let tensor = match self {
            DynamicImage::ImageLuma8(image) => image.into_tensor(),
            DynamicImage::ImageLumaA8(image) => image.into_tensor(),
            DynamicImage::ImageRgb8(image) => image.into_tensor(),
            DynamicImage::ImageRgba8(image) => image.into_tensor(),
            DynamicImage::ImageBgr8(_) => (&self.to_rgb8()).into_tensor(),
            DynamicImage::ImageBgra8(_) => (&self.to_rgba8()).into_tensor(),
            _ => bail!("cannot convert an image with u16 components to a tensor"),
        };
        Ok(tensor)
    }
}

/// Converts an image to a float `[channels, height, width]` tensor in `[0, 1]`.
pub fn f_image_to_unit_tensor(image: &DynamicImage) -> Result<Tensor> {
    let tensor = image.try_into_tensor()?;
    Ok(tensor.f_to_kind(Kind::Float)? / 255.0)
}

/// Converts a `[channels, height, width]` or `[height, width]` tensor back to
/// an image.
///
/// Floating point tensors are expected in `[0, 1]`, integer tensors in
/// `[0, 255]`. One to four channels are accepted.
pub fn f_tensor_to_image(tensor: &Tensor) -> Result<DynamicImage> {
    let tensor = match tensor.dim() {
        2 => tensor.f_unsqueeze(0)?,
        3 => tensor.shallow_clone(),
        dim => bail!(
            "expect a 2D or 3D image tensor, but get a {}D tensor with shape {:?}",
            dim,
            tensor.size()
        ),
    };
    let size = tensor.size();
    let (channels, height, width) = (size[0], size[1] as u32, size[2] as u32);

    let tensor = match tensor.kind() {
        Kind::Float | Kind::Double | Kind::Half => (&tensor * 255.0)
            .round()
            .clamp(0.0, 255.0)
            .f_to_kind(Kind::Uint8)?,
        Kind::Uint8 => tensor,
        _ => tensor.clamp(0i64, 255i64).f_to_kind(Kind::Uint8)?,
    };
    let pixels: Vec<u8> = tensor.f_permute(&[1, 2, 0])?.f_flat_values()?;

    let image = match channels {
        1 => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels)
            .map(DynamicImage::ImageLuma8),
        2 => ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, pixels)
            .map(DynamicImage::ImageLumaA8),
        3 => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgb8),
        4 => ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgba8),
        _ => bail!("unsupported number of image channels {}", channels),
    };
    image.ok_or_else(|| format_err!("image buffer size does not match its dimensions"))
}
