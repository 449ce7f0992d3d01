use super::{Rect, XYXY};
use crate::common::*;

/// Bounding box in origin-size format `(x, y, w, h)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XYWH<T> {
    pub(crate) x: T,
    pub(crate) y: T,
    pub(crate) w: T,
    pub(crate) h: T,
}

impl<T> XYWH<T> {
    pub fn try_cast<V>(self) -> Option<XYWH<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(XYWH {
            x: V::from(self.x)?,
            y: V::from(self.y)?,
            w: V::from(self.w)?,
            h: V::from(self.h)?,
        })
    }

    pub fn cast<V>(self) -> XYWH<V>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> Rect for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn x1(&self) -> Self::Type {
        self.x
    }

    fn y1(&self) -> Self::Type {
        self.y
    }

    fn x2(&self) -> Self::Type {
        self.x + self.w
    }

    fn y2(&self) -> Self::Type {
        self.y + self.h
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self> {
        let [x1, y1, x2, y2] = xyxy;
        Self::try_from_xywh([x1, y1, x2 - x1, y2 - y1])
    }

    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self> {
        let [x, y, w, h] = xywh;
        let zero = T::zero();
        ensure!(w >= zero && h >= zero, "w and h must be non-negative");
        Ok(Self { x, y, w, h })
    }
}

impl<T> From<XYXY<T>> for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    fn from(from: XYXY<T>) -> Self {
        Self::from(&from)
    }
}

impl<T> From<&XYXY<T>> for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    fn from(from: &XYXY<T>) -> Self {
        Self {
            x: from.x1(),
            y: from.y1(),
            w: from.w(),
            h: from.h(),
        }
    }
}
