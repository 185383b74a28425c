use core::fmt;

/// Which panel axis a calibration problem was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError {
    /// The two corner taps coincide on an axis, which would leave the
    /// rescale with a zero-width raw range.
    #[error("corner taps coincide on the {0} axis")]
    DegenerateAxis(Axis),
}
