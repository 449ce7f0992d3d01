use crate::common::*;

/// Image or box extent, width first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Size<T> {
    w: T,
    h: T,
}

impl<T> Size<T> {
    pub fn try_cast<U>(self) -> Option<Size<U>>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        Some(Size {
            w: U::from(self.w)?,
            h: U::from(self.h)?,
        })
    }

    pub fn cast<U>(self) -> Size<U>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> Size<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_wh(wh: [T; 2]) -> Result<Self> {
        let [w, h] = wh;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { w, h })
    }

    pub fn from_wh(wh: [T; 2]) -> Self {
        Self::try_from_wh(wh).unwrap()
    }

    pub fn area(&self) -> T {
        self.w * self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn h(&self) -> T {
        self.h
    }
}
