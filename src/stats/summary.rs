use crate::structs::SeriesSummary;

impl SeriesSummary {
    /// Calculate statistics for one timeseries; `None` when it is empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let std_dev = variance.sqrt();

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count,
            mean,
            std_dev,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_summary() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = SeriesSummary::calculate(&values).expect("calculate stats");

        assert_eq!(stats.count, 10);
        assert!((stats.mean - 5.5).abs() < 0.01);
        assert!((stats.min - 1.0).abs() < 0.01);
        assert!((stats.max - 10.0).abs() < 0.01);
        assert!(!stats.is_constant());
    }

    #[test]
    fn test_constant_series() {
        let stats = SeriesSummary::calculate(&[0.0; 5]).expect("calculate stats");
        assert!(stats.is_constant());
        assert!(stats.summary().starts_with("n=5"));
    }

    #[test]
    fn test_empty_series() {
        assert!(SeriesSummary::calculate(&[]).is_none());
    }
}
