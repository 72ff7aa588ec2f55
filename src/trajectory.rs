//! Trajectory frames, periodic boxes, and the frame source contract.
//!
//! Frame coordinates arrive as plain `[f64; 3]` arrays in Ångströms. The
//! unit cell travels with each frame as the conventional 6-element
//! descriptor `[a, b, c, alpha, beta, gamma]` (lengths in Å, angles in
//! degrees) and is validated into a [`PeriodicBox`] before any distance
//! work happens.

use crate::error::AnalysisError;
use nalgebra as na;

/// A validated simulation box, ready for minimum-image arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodicBox {
    /// No box; distances are plain Euclidean.
    None,
    /// Rectangular box with edge lengths `[lx, ly, lz]`.
    Orthorhombic([f64; 3]),
    /// General triclinic cell.
    Triclinic {
        /// Cell matrix with the three box vectors as columns.
        cell: na::Matrix3<f64>,
        /// Inverse of the cell matrix, for fractional coordinates.
        inv: na::Matrix3<f64>,
    },
}

impl PeriodicBox {
    /// Validate a 6-element box descriptor.
    ///
    /// An all-zero descriptor means "no box". Otherwise all lengths must be
    /// positive and all angles strictly between 0° and 180°; a cell whose
    /// vectors are (numerically) coplanar is rejected.
    pub fn from_dimensions(dims: [f64; 6]) -> Result<Self, AnalysisError> {
        if dims.iter().all(|&d| d == 0.0) {
            return Ok(PeriodicBox::None);
        }

        let [a, b, c, alpha, beta, gamma] = dims;
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return Err(AnalysisError::MalformedBox(format!(
                "non-positive box lengths in {dims:?}"
            )));
        }
        for angle in [alpha, beta, gamma] {
            if !(0.0..180.0).contains(&angle) || angle == 0.0 || !angle.is_finite() {
                return Err(AnalysisError::MalformedBox(format!(
                    "box angle {angle} out of range (0, 180)"
                )));
            }
        }

        if alpha == 90.0 && beta == 90.0 && gamma == 90.0 {
            return Ok(PeriodicBox::Orthorhombic([a, b, c]));
        }

        // Standard crystallographic cell matrix with box vectors as columns
        let (cos_a, cos_b) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (cos_g, sin_g) = (gamma.to_radians().cos(), gamma.to_radians().sin());
        let cx = c * cos_b;
        let cy = c * (cos_a - cos_b * cos_g) / sin_g;
        let cz_sq = c * c - cx * cx - cy * cy;
        if cz_sq <= f64::EPSILON {
            return Err(AnalysisError::MalformedBox(format!(
                "degenerate cell for dimensions {dims:?}"
            )));
        }

        let cell = na::Matrix3::new(
            a,
            b * cos_g,
            cx,
            0.0,
            b * sin_g,
            cy,
            0.0,
            0.0,
            cz_sq.sqrt(),
        );
        let inv = cell.try_inverse().ok_or_else(|| {
            AnalysisError::MalformedBox(format!("singular cell for dimensions {dims:?}"))
        })?;
        Ok(PeriodicBox::Triclinic { cell, inv })
    }

    /// Apply the minimum-image convention to a displacement vector.
    pub fn min_image(&self, d: [f64; 3]) -> [f64; 3] {
        match self {
            PeriodicBox::None => d,
            PeriodicBox::Orthorhombic(lengths) => {
                let mut out = d;
                for i in 0..3 {
                    out[i] -= lengths[i] * (out[i] / lengths[i]).round();
                }
                out
            }
            PeriodicBox::Triclinic { cell, inv } => {
                let mut frac = inv * na::Vector3::new(d[0], d[1], d[2]);
                for i in 0..3 {
                    frac[i] -= frac[i].round();
                }
                let cart = cell * frac;
                [cart.x, cart.y, cart.z]
            }
        }
    }

    /// Squared minimum-image distance between two points.
    pub fn distance_squared(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let d = self.min_image([b[0] - a[0], b[1] - a[1], b[2] - a[2]]);
        d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
    }
}

/// One time step of a trajectory: positions for every atom in the
/// topology, plus the unit cell if the system is periodic.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Cartesian coordinates in Å, one entry per topology atom.
    pub positions: Vec<[f64; 3]>,
    /// Unit cell as `[a, b, c, alpha, beta, gamma]`, if any.
    pub dimensions: Option<[f64; 6]>,
}

impl Frame {
    /// Create a frame from coordinates and an optional unit cell.
    pub fn new(positions: Vec<[f64; 3]>, dimensions: Option<[f64; 6]>) -> Self {
        Self {
            positions,
            dimensions,
        }
    }

    /// Validate this frame's unit cell into a [`PeriodicBox`].
    pub fn periodic_box(&self) -> Result<PeriodicBox, AnalysisError> {
        match self.dimensions {
            Some(dims) => PeriodicBox::from_dimensions(dims),
            None => Ok(PeriodicBox::None),
        }
    }
}

/// A sequential source of trajectory frames.
///
/// Frames are read synchronously and in trajectory order; an implementation
/// may abort the analysis by returning an error from [`Self::next_frame`].
pub trait TrajectorySource {
    /// Total number of frames this source will yield, if known up front.
    fn n_frames(&self) -> usize;

    /// The next frame, or `None` once the trajectory is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError>;
}

/// A trajectory held entirely in memory.
///
/// This is the in-process frame provider used in tests and by callers that
/// already hold coordinates; file readers are external collaborators.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrajectory {
    frames: Vec<Frame>,
    cursor: usize,
}

impl InMemoryTrajectory {
    /// Wrap a list of frames.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Rewind to the first frame.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl TrajectorySource for InMemoryTrajectory {
    fn n_frames(&self) -> usize {
        self.frames.len()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
        match self.frames.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                Ok(Some(frame.clone()))
            }
            None => Ok(None),
        }
    }
}
