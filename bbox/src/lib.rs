//! Safe bounding box types and functions.

mod common;

pub mod unchecked;
pub use unchecked::*;

pub use rect::*;
pub mod rect;

pub use xyxy::*;
pub mod xyxy;

pub use xywh::*;
pub mod xywh;

pub use size::*;
pub mod size;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
