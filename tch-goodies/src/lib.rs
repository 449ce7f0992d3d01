//! Tensor helpers shared by the data model crates.

mod common;
pub mod image_tensor;
pub mod tensor;

pub use image_tensor::*;
pub use tensor::*;
