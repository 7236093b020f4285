use thiserror::Error;

/// Raised when a rectangle's corners are inverted on either axis.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Rectangle corners are inverted: x [{x_min}, {x_max}], y [{y_min}, {y_max}]")]
pub struct InvalidGeometry {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

/// An axis-aligned rectangle in integer pixel coordinates, stored
/// corner-to-corner.
///
/// Construction rejects inverted corners; zero-area rectangles (a point
/// or a line) are valid. Width and height are derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    x_min: i32,
    y_min: i32,
    x_max: i32,
    y_max: i32,
}

impl Rect {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Result<Self, InvalidGeometry> {
        if x_max < x_min || y_max < y_min {
            return Err(InvalidGeometry {
                x_min,
                y_min,
                x_max,
                y_max,
            });
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub fn x_min(&self) -> i32 {
        self.x_min
    }

    pub fn y_min(&self) -> i32 {
        self.y_min
    }

    pub fn x_max(&self) -> i32 {
        self.x_max
    }

    pub fn y_max(&self) -> i32 {
        self.y_max
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) as f64 / 2.0,
            (self.y_min + self.y_max) as f64 / 2.0,
        )
    }

    /// Corner-to-corner length, used as a size-relative distance scale.
    pub fn diagonal(&self) -> f64 {
        (self.width() as f64).hypot(self.height() as f64)
    }

    pub fn iou(&self, other: &Rect) -> f64 {
        let ix_min = self.x_min.max(other.x_min);
        let iy_min = self.y_min.max(other.y_min);
        let ix_max = self.x_max.min(other.x_max);
        let iy_max = self.y_max.min(other.y_max);

        let inter = (ix_max - ix_min).max(0) as f64 * (iy_max - iy_min).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() as f64 * self.height() as f64;
        let area_b = other.width() as f64 * other.height() as f64;
        inter / (area_a + area_b - inter)
    }
}
