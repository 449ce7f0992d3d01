use crate::{common::*, rect::Rect, XYWH, XYXY};

/// Unvalidated corner coordinates, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XYXY_<T> {
    pub x1: T,
    pub y1: T,
    pub x2: T,
    pub y2: T,
}

/// Unvalidated origin-size coordinates, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XYWH_<T> {
    pub x: T,
    pub y: T,
    pub w: T,
    pub h: T,
}

impl<T> TryFrom<XYXY_<T>> for XYXY<T>
where
    T: Copy + Num + PartialOrd,
{
    type Error = anyhow::Error;

    fn try_from(from: XYXY_<T>) -> Result<Self, Self::Error> {
        Self::try_from(&from)
    }
}

impl<T> TryFrom<&XYXY_<T>> for XYXY<T>
where
    T: Copy + Num + PartialOrd,
{
    type Error = anyhow::Error;

    fn try_from(from: &XYXY_<T>) -> Result<Self, Self::Error> {
        let XYXY_ { x1, y1, x2, y2 } = *from;
        Self::try_from_xyxy([x1, y1, x2, y2])
    }
}

impl<T> TryFrom<XYWH_<T>> for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    type Error = anyhow::Error;

    fn try_from(from: XYWH_<T>) -> Result<Self, Self::Error> {
        Self::try_from(&from)
    }
}

impl<T> TryFrom<&XYWH_<T>> for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    type Error = anyhow::Error;

    fn try_from(from: &XYWH_<T>) -> Result<Self, Self::Error> {
        let XYWH_ { x, y, w, h } = *from;
        Self::try_from_xywh([x, y, w, h])
    }
}
