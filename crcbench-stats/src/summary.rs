//! Summary Statistics
//!
//! Every row of the benchmark table reports `mean ± stddev` for three sample
//! series (speed, elapsed time, setup time). The standard deviation is the
//! population one: the sum of squared deviations is divided by `N`.

/// Mean and population standard deviation of a sample series.
///
/// A single sample yields a standard deviation of exactly `0.0`.
/// An empty series yields `(0.0, 0.0)`.
pub fn mean_and_std_dev(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    (mean, variance.sqrt())
}

/// Summary of one sample series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Number of samples
    pub count: usize,
}

impl Summary {
    /// Summarise a sample series
    pub fn from_samples(samples: &[f64]) -> Self {
        let (mean, std_dev) = mean_and_std_dev(samples);
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std_dev,
            min: if samples.is_empty() { 0.0 } else { min },
            max: if samples.is_empty() { 0.0 } else { max },
            count: samples.len(),
        }
    }

    /// Relative spread (`std_dev / mean`), 0 when the mean is 0
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            self.std_dev / self.mean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample() {
        let (mean, std_dev) = mean_and_std_dev(&[42.5]);
        assert!((mean - 42.5).abs() < f64::EPSILON);
        assert_eq!(std_dev, 0.0);
    }

    #[test]
    fn test_identical_samples() {
        let (mean, std_dev) = mean_and_std_dev(&[7.25, 7.25, 7.25]);
        assert!((mean - 7.25).abs() < f64::EPSILON);
        assert_eq!(std_dev, 0.0);
    }

    #[test]
    fn test_population_not_sample_std_dev() {
        // Sample stddev of [0, 10] would be ~7.07
        let (mean, std_dev) = mean_and_std_dev(&[0.0, 10.0]);
        assert!((mean - 5.0).abs() < f64::EPSILON);
        assert!((std_dev - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_distribution() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, std_dev) = mean_and_std_dev(&samples);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(mean_and_std_dev(&[]), (0.0, 0.0));
        let summary = Summary::from_samples(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 0.0);
    }

    #[test]
    fn test_summary_extremes() {
        let summary = Summary::from_samples(&[3.0, 1.0, 2.0]);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let summary = Summary::from_samples(&[0.0, 10.0]);
        assert!((summary.coefficient_of_variation() - 1.0).abs() < f64::EPSILON);
        assert_eq!(Summary::from_samples(&[0.0]).coefficient_of_variation(), 0.0);
    }
}
