use serde::{Deserialize, Serialize};

use crate::types::{AlbedoError, AlbedoResult};

/// Default class breakpoints over glacier fraction
pub const DEFAULT_BREAKPOINTS: [f64; 4] = [0.25, 0.50, 0.75, 0.90];

/// Glacier coverage class of a pixel, ordered from border to pure ice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FractionClass {
    Border,
    MixedLow,
    MixedHigh,
    MostlyIce,
    PureIce,
}

impl FractionClass {
    pub const ALL: [FractionClass; 5] = [
        FractionClass::Border,
        FractionClass::MixedLow,
        FractionClass::MixedHigh,
        FractionClass::MostlyIce,
        FractionClass::PureIce,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column prefix used in exported tables
    pub fn name(self) -> &'static str {
        match self {
            FractionClass::Border => "border",
            FractionClass::MixedLow => "mixed_low",
            FractionClass::MixedHigh => "mixed_high",
            FractionClass::MostlyIce => "mostly_ice",
            FractionClass::PureIce => "pure_ice",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FractionClass::Border => "Border",
            FractionClass::MixedLow => "Mixed low",
            FractionClass::MixedHigh => "Mixed high",
            FractionClass::MostlyIce => "Mostly ice",
            FractionClass::PureIce => "Pure ice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|class| class.name() == name)
    }
}

impl std::fmt::Display for FractionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Maps glacier fraction onto half-open, lower-inclusive classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionClassifier {
    breakpoints: [f64; 4],
}

impl Default for FractionClassifier {
    fn default() -> Self {
        Self {
            breakpoints: DEFAULT_BREAKPOINTS,
        }
    }
}

impl FractionClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Breakpoints must be strictly increasing inside (0, 1)
    pub fn with_breakpoints(breakpoints: [f64; 4]) -> AlbedoResult<Self> {
        let inside = breakpoints.iter().all(|b| *b > 0.0 && *b < 1.0);
        let increasing = breakpoints.windows(2).all(|w| w[0] < w[1]);
        if !inside || !increasing {
            return Err(AlbedoError::InvalidInput(format!(
                "Fraction breakpoints must be strictly increasing within (0, 1): {:?}",
                breakpoints
            )));
        }
        Ok(Self { breakpoints })
    }

    pub fn breakpoints(&self) -> [f64; 4] {
        self.breakpoints
    }

    /// Fraction range `[lower, upper)` covered by a class; pure ice is closed at 1
    pub fn bounds(&self, class: FractionClass) -> (f64, f64) {
        let index = class.index();
        let lower = if index == 0 { 0.0 } else { self.breakpoints[index - 1] };
        let upper = self.breakpoints.get(index).copied().unwrap_or(1.0);
        (lower, upper)
    }

    /// Human-readable class name with its percentage range, e.g. "Mostly ice (75-90%)"
    pub fn label(&self, class: FractionClass) -> String {
        let (lower, upper) = self.bounds(class);
        format!("{} ({}-{}%)", class.title(), percent_text(lower), percent_text(upper))
    }

    pub fn classify(&self, fraction: f64) -> AlbedoResult<FractionClass> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(AlbedoError::InvalidInput(format!(
                "Glacier fraction {} outside [0, 1]",
                fraction
            )));
        }
        let index = self
            .breakpoints
            .iter()
            .position(|b| fraction < *b)
            .unwrap_or(self.breakpoints.len());
        Ok(FractionClass::ALL[index])
    }
}

fn percent_text(fraction: f64) -> String {
    let pct = (fraction * 10_000.0).round() / 100.0;
    format!("{}", pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let classifier = FractionClassifier::new();
        assert_eq!(classifier.classify(0.0).unwrap(), FractionClass::Border);
        assert_eq!(classifier.classify(0.2499).unwrap(), FractionClass::Border);
        assert_eq!(classifier.classify(0.25).unwrap(), FractionClass::MixedLow);
        assert_eq!(classifier.classify(0.50).unwrap(), FractionClass::MixedHigh);
        assert_eq!(classifier.classify(0.75).unwrap(), FractionClass::MostlyIce);
        assert_eq!(classifier.classify(0.8999).unwrap(), FractionClass::MostlyIce);
        assert_eq!(classifier.classify(0.90).unwrap(), FractionClass::PureIce);
        assert_eq!(classifier.classify(1.0).unwrap(), FractionClass::PureIce);
    }

    #[test]
    fn test_every_fraction_maps_to_one_ordered_class() {
        let classifier = FractionClassifier::new();
        let mut previous = FractionClass::Border;
        for step in 0..=1000 {
            let class = classifier.classify(step as f64 / 1000.0).unwrap();
            assert!(class >= previous);
            previous = class;
        }
        assert_eq!(previous, FractionClass::PureIce);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let classifier = FractionClassifier::new();
        assert!(matches!(classifier.classify(-0.01), Err(AlbedoError::InvalidInput(_))));
        assert!(matches!(classifier.classify(1.01), Err(AlbedoError::InvalidInput(_))));
        assert!(matches!(classifier.classify(f64::NAN), Err(AlbedoError::InvalidInput(_))));
    }

    #[test]
    fn test_custom_breakpoints() {
        let classifier = FractionClassifier::with_breakpoints([0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(classifier.classify(0.35).unwrap(), FractionClass::MostlyIce);
        assert_eq!(classifier.classify(0.4).unwrap(), FractionClass::PureIce);

        assert!(FractionClassifier::with_breakpoints([0.5, 0.4, 0.6, 0.7]).is_err());
        assert!(FractionClassifier::with_breakpoints([0.0, 0.4, 0.6, 0.7]).is_err());
        assert!(FractionClassifier::with_breakpoints([0.2, 0.4, 0.6, 1.0]).is_err());
    }

    #[test]
    fn test_labels_follow_breakpoints() {
        let classifier = FractionClassifier::new();
        assert_eq!(classifier.label(FractionClass::Border), "Border (0-25%)");
        assert_eq!(classifier.label(FractionClass::MostlyIce), "Mostly ice (75-90%)");
        assert_eq!(classifier.label(FractionClass::PureIce), "Pure ice (90-100%)");

        let narrow = FractionClassifier::with_breakpoints([0.02, 0.04, 0.06, 0.08]).unwrap();
        let class = narrow.classify(0.05).unwrap();
        assert_eq!(class, FractionClass::MixedHigh);
        assert_eq!(narrow.label(class), "Mixed high (4-6%)");
        assert_eq!(narrow.label(FractionClass::PureIce), "Pure ice (8-100%)");

        let fine = FractionClassifier::with_breakpoints([0.125, 0.5, 0.75, 0.9]).unwrap();
        assert_eq!(fine.label(FractionClass::MixedLow), "Mixed low (12.5-50%)");
    }

    #[test]
    fn test_names_round_trip() {
        for class in FractionClass::ALL {
            assert_eq!(FractionClass::from_name(class.name()), Some(class));
        }
        assert_eq!(FractionClass::from_name("glacier"), None);
    }
}
