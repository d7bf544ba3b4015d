use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout `igafem`.
///
/// This is a trait alias for `RealField + Copy` with a few conversion helpers that are needed
/// whenever integer counts or tabulated `f64` constants enter floating-point expressions.
pub trait Real: RealField + Copy {
    /// Converts an `f64` constant into the scalar type.
    fn from_f64_lossy(value: f64) -> Self {
        nalgebra::convert(value)
    }

    /// Converts a count (degree, multiplicity, binomial coefficient) into the scalar type.
    fn from_count(count: usize) -> Self {
        nalgebra::convert(count as f64)
    }
}

impl<T: RealField + Copy> Real for T {}
