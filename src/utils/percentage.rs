use std::fmt::Display;

/// Progress through the working day, shown as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Percentage {
    /// Converts a 0..1 ratio. Anything outside the range or NaN is clamped.
    pub fn from_ratio(ratio: f64) -> Percentage {
        if ratio.is_nan() {
            return Percentage(0.);
        }
        Percentage(ratio.clamp(0., 1.) * 100.)
    }
}
