//! Page geometry: size, rotation and rectangles

use lopdf::{Object, ObjectId};

/// Page rotation as stored in the `/Rotate` entry (clockwise, applied by the viewer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize an arbitrary `/Rotate` value
    ///
    /// Negative values and multiples of 360 are folded into 0..360. Values that
    /// are not a multiple of 90 are invalid per the PDF reference and are
    /// treated as no rotation.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    /// Rotation angle in degrees (0, 90, 180 or 270)
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Exact `(cos, sin)` of the angle, avoiding floating point noise
    pub fn cos_sin(self) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (1.0, 0.0),
            Rotation::Deg90 => (0.0, 1.0),
            Rotation::Deg180 => (-1.0, 0.0),
            Rotation::Deg270 => (0.0, -1.0),
        }
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalized rectangle from a PDF `[llx lly urx ury]` array
    ///
    /// Corners may be given in any order.
    pub fn from_pdf_array(array: &[Object]) -> Option<Self> {
        if array.len() < 4 {
            return None;
        }
        let x1 = object_to_f64(&array[0])?;
        let y1 = object_to_f64(&array[1])?;
        let x2 = object_to_f64(&array[2])?;
        let y2 = object_to_f64(&array[3])?;

        Some(Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        })
    }
}

/// Geometry of a single page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Zero-based page index
    pub index: usize,
    /// Object id of the page dictionary
    pub id: ObjectId,
    /// MediaBox width in points
    pub width: f64,
    /// MediaBox height in points
    pub height: f64,
    /// Effective (possibly inherited) rotation
    pub rotation: Rotation,
}

/// Read a numeric PDF object as f64
pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}
