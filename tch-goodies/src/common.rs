pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
pub use itertools::Itertools;
pub use std::{borrow::Borrow, iter, ops::Deref};
pub use tch::{kind::Element, Device, Kind, Tensor};
