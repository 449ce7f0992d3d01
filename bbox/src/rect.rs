use super::{Size, XYWH, XYXY};
use crate::common::*;

/// The generic rectangle in image coordinates.
///
/// `x` grows to the right and `y` grows downwards, so `(x1, y1)` is the
/// top-left corner and `(x2, y2)` the bottom-right one.
pub trait Rect {
    type Type;

    fn x1(&self) -> Self::Type;
    fn y1(&self) -> Self::Type;
    fn x2(&self) -> Self::Type;
    fn y2(&self) -> Self::Type;
    fn w(&self) -> Self::Type;
    fn h(&self) -> Self::Type;

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd + Copy,
{
    fn from_xyxy(xyxy: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xyxy(xyxy).unwrap()
    }

    fn from_xywh(xywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xywh(xywh).unwrap()
    }

    fn xyxy(&self) -> [Self::Type; 4] {
        [self.x1(), self.y1(), self.x2(), self.y2()]
    }

    fn xywh(&self) -> [Self::Type; 4] {
        [self.x1(), self.y1(), self.w(), self.h()]
    }

    fn wh(&self) -> [Self::Type; 2] {
        [self.w(), self.h()]
    }

    fn to_xyxy(&self) -> XYXY<Self::Type> {
        XYXY {
            x1: self.x1(),
            y1: self.y1(),
            x2: self.x2(),
            y2: self.y2(),
        }
    }

    fn to_xywh(&self) -> XYWH<Self::Type> {
        XYWH {
            x: self.x1(),
            y: self.y1(),
            w: self.w(),
            h: self.h(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.w() * self.h()
    }

    /// Returns true if the box lies in the positive quadrant and has a
    /// non-zero extent in both directions.
    fn is_valid(&self) -> bool {
        let zero = Self::Type::zero();
        self.x1() >= zero
            && self.y1() >= zero
            && self.x2() > self.x1()
            && self.y2() > self.y1()
            && self.w() > zero
            && self.h() > zero
    }

    /// Scales the coordinates into the unit square of an image of the given size.
    ///
    /// Every corner must lie within the image.
    fn try_normalize(&self, size: &Size<Self::Type>) -> Result<Self>
    where
        Self: Sized,
    {
        let width = size.w();
        let height = size.h();
        let zero = Self::Type::zero();
        ensure!(width > zero, "width must be greater than 0");
        ensure!(height > zero, "height must be greater than 0");
        ensure!(
            self.x1() <= width && self.x2() <= width,
            "x coordinates must not exceed the width"
        );
        ensure!(
            self.y1() <= height && self.y2() <= height,
            "y coordinates must not exceed the height"
        );

        Self::try_from_xyxy([
            self.x1() / width,
            self.y1() / height,
            self.x2() / width,
            self.y2() / height,
        ])
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Compute the smallest box enclosing both boxes.
    fn closure_with<R>(&self, other: &R) -> XYXY<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        let x1 = self.x1().min(other.x1());
        let y1 = self.y1().min(other.y1());
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        XYXY::from_xyxy([x1, y1, x2, y2])
    }

    fn intersect_with<R>(&self, other: &R) -> Option<XYXY<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let x1 = self.x1().max(other.x1());
        let y1 = self.y1().max(other.y1());
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        (x2 > x1 && y2 > y1).then(|| XYXY::from_xyxy([x1, y1, x2, y2]))
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    fn iou_with<R>(&self, other: &R, epsilon: Self::Type) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.w() * other.h() - inter_area + epsilon;
        inter_area / union_area
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd + Copy,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rect_validity() {
        assert!(XYXY::from_xyxy([1.0, 2.0, 3.0, 4.0]).is_valid());
        assert!(!XYXY::from_xyxy([-1.0, 2.0, 3.0, 4.0]).is_valid());
        assert!(!XYWH::from_xywh([1.0, 2.0, 0.0, 4.0]).is_valid());
    }

    #[test]
    fn rect_normalize() {
        let rect = XYXY::from_xyxy([10.0, 20.0, 30.0, 40.0]);
        let size = Size::from_wh([100.0, 50.0]);
        let normalized = rect.try_normalize(&size).unwrap();
        assert_abs_diff_eq!(normalized.x1(), 0.1);
        assert_abs_diff_eq!(normalized.y1(), 0.4);
        assert_abs_diff_eq!(normalized.x2(), 0.3);
        assert_abs_diff_eq!(normalized.y2(), 0.8);

        let outside = XYXY::from_xyxy([10.0, 20.0, 130.0, 40.0]);
        assert!(outside.try_normalize(&size).is_err());
    }

    #[test]
    fn rect_iou() {
        let lhs = XYXY::from_xyxy([0.0, 0.0, 2.0, 2.0]);
        let rhs = XYWH::from_xywh([1.0, 1.0, 2.0, 2.0]);
        assert_abs_diff_eq!(lhs.intersection_area_with(&rhs), 1.0);
        assert_abs_diff_eq!(lhs.iou_with(&rhs, 0.0), 1.0 / 7.0);

        let far = XYXY::from_xyxy([5.0, 5.0, 6.0, 6.0]);
        assert!(lhs.intersect_with(&far).is_none());
        assert_eq!(lhs.closure_with(&far).xyxy(), [0.0, 0.0, 6.0, 6.0]);
    }
}
