use super::features::UpcomingFeatureRow;
use super::split::TrainPartition;

/// Threshold below which a column is treated as constant.
const STD_EPSILON: f64 = 1e-12;

/// Per-column centering and scaling learned from the training partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    means: Vec<f64>,
    /// Population standard deviations; 1.0 for constant columns
    scales: Vec<f64>,
}

impl Scaler {
    /// Fit on training rows only; holdout and upcoming rows are never seen.
    pub fn fit(train: &TrainPartition) -> Self {
        let n_cols = train.rows().first().map_or(0, |r| r.values.len());
        let n = train.len().max(1) as f64;

        let mut means = vec![0.0; n_cols];
        for row in train.values() {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; n_cols];
        for row in train.values() {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std < STD_EPSILON { 1.0 } else { std };
        }

        Scaler { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_rows<'r>(&self, rows: impl Iterator<Item = &'r [f64]>) -> Vec<Vec<f64>> {
        rows.map(|r| self.transform(r)).collect()
    }

    /// Standardise the upcoming row. Columns that could not be computed take
    /// the training mean, which standardises to 0.
    pub fn transform_upcoming(&self, row: &UpcomingFeatureRow) -> Vec<f64> {
        row.values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| v.map_or(0.0, |v| (v - m) / s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::features::{FeatureKey, FeatureRow, FeatureTable};
    use crate::predict::split::split;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn train_and_test(rows: &[[f64; 3]], holdout: usize) -> (TrainPartition, crate::predict::split::HoldoutPartition) {
        let date = NaiveDate::from_ymd_opt(2024, 10, 22).unwrap();
        let table = FeatureTable {
            keys: vec![FeatureKey::HOME; 3],
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, r)| FeatureRow {
                    game_index: i,
                    game_date: date,
                    values: r.to_vec(),
                    label: i % 2 == 0,
                })
                .collect(),
        };
        split(table, holdout).unwrap()
    }

    #[test]
    fn training_columns_are_standardised() {
        let rows = [
            [1.0, 10.0, 5.0],
            [0.0, 14.0, 5.0],
            [1.0, 9.0, 5.0],
            [0.0, 21.0, 5.0],
            [1.0, 16.0, 5.0],
            [0.0, 100.0, 50.0],
        ];
        let (train, _) = train_and_test(&rows, 1);
        let scaler = Scaler::fit(&train);
        let scaled = scaler.transform_rows(train.values());

        for col in 0..2 {
            let values: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(var.sqrt(), 1.0, epsilon = 1e-12);
        }
        // Constant column stays finite and centred.
        assert!(scaled.iter().all(|r| r[2] == 0.0));
        assert_relative_eq!(scaler.scales[2], 1.0);
    }

    #[test]
    fn holdout_does_not_influence_fit() {
        let mut rows = vec![[1.0, 10.0, 3.0], [0.0, 12.0, 4.0], [1.0, 14.0, 5.0], [0.0, 16.0, 6.0]];
        let (train, _) = train_and_test(&rows, 1);
        let before = Scaler::fit(&train);

        rows[3] = [1.0, 1000.0, -50.0];
        let (train, test) = train_and_test(&rows, 1);
        let after = Scaler::fit(&train);
        assert_eq!(before, after);

        // Holdout rows are transformed with training parameters.
        let scaled = after.transform_rows(test.values());
        assert_relative_eq!(scaled[0][1], (1000.0 - 12.0) / after.scales[1], epsilon = 1e-9);
    }

    #[test]
    fn missing_upcoming_values_standardise_to_zero() {
        let rows = [[1.0, 10.0, 3.0], [0.0, 12.0, 4.0], [1.0, 14.0, 5.0], [0.0, 16.0, 6.0]];
        let (train, _) = train_and_test(&rows, 1);
        let scaler = Scaler::fit(&train);
        let upcoming = UpcomingFeatureRow {
            keys: vec![FeatureKey::HOME; 3],
            values: vec![Some(1.0), None, Some(4.0)],
        };
        let scaled = scaler.transform_upcoming(&upcoming);
        assert_eq!(scaled[1], 0.0);
        assert_relative_eq!(scaled[2], 0.0, epsilon = 1e-12);
        assert!(scaled[0] > 0.0);
    }
}
