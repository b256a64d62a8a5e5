use crate::config::ClassificationConfig;
use crate::error::ChoroplethError;
use crate::types::{Color, Shade};
use serde::Serialize;

/// Ratio classes, highest bound first.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    thresholds: Vec<(f64, Color)>,
    low: Color,
    zero: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
}

impl ThresholdTable {
    /// Bounds must be finite, positive and strictly decreasing.
    pub fn new(thresholds: Vec<(f64, Color)>, low: Color, zero: Color) -> Result<Self, ChoroplethError> {
        if thresholds.is_empty() {
            return Err(ChoroplethError::EmptyThresholds);
        }
        for &(bound, _) in &thresholds {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(ChoroplethError::InvalidBound(bound));
            }
        }
        for pair in thresholds.windows(2) {
            let (previous, next) = (pair[0].0, pair[1].0);
            if next >= previous {
                return Err(ChoroplethError::UnsortedThresholds { previous, next });
            }
        }
        Ok(Self { thresholds, low, zero })
    }

    pub fn from_config(config: &ClassificationConfig) -> Result<Self, ChoroplethError> {
        let thresholds = config.thresholds.iter().map(|t| (t.bound, t.color)).collect();
        Self::new(thresholds, config.low_color, config.zero_color)
    }

    /// Color of the first class whose bound is `<= ratio`.
    ///
    /// Ratios below every bound get the low color when positive, the zero color otherwise.
    pub fn classify(&self, ratio: f64) -> Color {
        if let Some(&(_, color)) = self.thresholds.iter().find(|(bound, _)| *bound <= ratio) {
            return color;
        }
        if ratio > 0.0 {
            self.low
        } else {
            self.zero
        }
    }

    /// Shade for a region; a zero total never reaches `classify`.
    pub fn shade_for(&self, selected: u64, total: u64) -> Shade {
        if total == 0 {
            return Shade::NoData;
        }
        Shade::Fill(self.classify(selected as f64 / total as f64))
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut entries: Vec<LegendEntry> = self
            .thresholds
            .iter()
            .map(|&(bound, color)| LegendEntry {
                label: format!(">= {}%", format_percent(bound)),
                color,
            })
            .collect();
        if let Some(&(lowest, _)) = self.thresholds.last() {
            entries.push(LegendEntry {
                label: format!("< {}%", format_percent(lowest)),
                color: self.low,
            });
        }
        entries.push(LegendEntry { label: "0%".to_string(), color: self.zero });
        entries
    }
}

fn format_percent(ratio: f64) -> String {
    let pct = format!("{:.2}", ratio * 100.0);
    pct.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const C12: Color = Color::rgb(0x80, 0x00, 0x26);
    const C09: Color = Color::rgb(0xBD, 0x00, 0x26);
    const C06: Color = Color::rgb(0xE3, 0x1A, 0x1C);
    const C03: Color = Color::rgb(0xFC, 0x4E, 0x2A);
    const LOW: Color = Color::rgb(0xFD, 0x8D, 0x3C);
    const ZERO: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    fn table() -> ThresholdTable {
        ThresholdTable::new(vec![(0.12, C12), (0.09, C09), (0.06, C06), (0.03, C03)], LOW, ZERO).unwrap()
    }

    #[test]
    fn bound_is_inclusive() {
        assert_eq!(table().classify(0.09), C09);
        assert_eq!(table().classify(0.12), C12);
    }

    #[test]
    fn between_bounds_takes_lower_class() {
        assert_eq!(table().classify(0.0899), C06);
        assert_eq!(table().classify(0.5), C12);
        assert_eq!(table().classify(0.031), C03);
    }

    #[test]
    fn zero_and_low_colors() {
        assert_eq!(table().classify(0.0), ZERO);
        assert_eq!(table().classify(0.0001), LOW);
        assert_eq!(table().classify(-0.5), ZERO);
        assert_eq!(table().classify(f64::NAN), ZERO);
    }

    #[test]
    fn zero_total_bypasses_classifier() {
        assert_eq!(table().shade_for(5, 0), Shade::NoData);
        assert_eq!(table().shade_for(0, 0), Shade::NoData);
        assert_eq!(table().shade_for(0, 10), Shade::Fill(ZERO));
        assert_eq!(table().shade_for(9, 100), Shade::Fill(C09));
    }

    #[test]
    fn classify_is_idempotent() {
        let t = table();
        for ratio in [0.0, 0.01, 0.03, 0.07, 0.2] {
            assert_eq!(t.classify(ratio), t.classify(ratio));
        }
    }

    #[test]
    fn rejects_invalid_tables() {
        assert_eq!(ThresholdTable::new(vec![], LOW, ZERO).unwrap_err(), ChoroplethError::EmptyThresholds);
        assert_eq!(
            ThresholdTable::new(vec![(0.0, C12)], LOW, ZERO).unwrap_err(),
            ChoroplethError::InvalidBound(0.0)
        );
        assert!(matches!(
            ThresholdTable::new(vec![(f64::INFINITY, C12)], LOW, ZERO),
            Err(ChoroplethError::InvalidBound(_))
        ));
        assert_eq!(
            ThresholdTable::new(vec![(0.03, C03), (0.06, C06)], LOW, ZERO).unwrap_err(),
            ChoroplethError::UnsortedThresholds { previous: 0.03, next: 0.06 }
        );
        assert!(ThresholdTable::new(vec![(0.06, C06), (0.06, C03)], LOW, ZERO).is_err());
    }

    #[test]
    fn default_config_builds_a_valid_table() {
        let t = ThresholdTable::from_config(&ClassificationConfig::default()).unwrap();
        assert_eq!(t.classify(0.09), C09);
        assert_eq!(t.classify(0.01), LOW);
    }

    #[test]
    fn legend_lists_classes_then_low_then_zero() {
        let labels: Vec<String> = table().legend().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![">= 12%", ">= 9%", ">= 6%", ">= 3%", "< 3%", "0%"]);
    }
}
