use super::error::{PredictError, Result};
use super::features::{FeatureRow, FeatureTable};

/// Rows the model is fitted on. Only [`split`] can produce one, which is what
/// keeps holdout and upcoming rows out of any fit.
#[derive(Debug, Clone)]
pub struct TrainPartition {
    rows: Vec<FeatureRow>,
}

/// The chronologically final rows, reserved for evaluation.
#[derive(Debug, Clone)]
pub struct HoldoutPartition {
    rows: Vec<FeatureRow>,
}

macro_rules! partition_accessors {
    ($t:ty) => {
        impl $t {
            pub fn rows(&self) -> &[FeatureRow] {
                &self.rows
            }

            pub fn len(&self) -> usize {
                self.rows.len()
            }

            pub fn labels(&self) -> Vec<bool> {
                self.rows.iter().map(|r| r.label).collect()
            }

            pub fn values(&self) -> impl Iterator<Item = &[f64]> + '_ {
                self.rows.iter().map(|r| r.values.as_slice())
            }
        }
    };
}

partition_accessors!(TrainPartition);
partition_accessors!(HoldoutPartition);

/// Split a chronological table into a training prefix and the last
/// `holdout_size` rows. Order is preserved; nothing is shuffled.
pub fn split(table: FeatureTable, holdout_size: usize) -> Result<(TrainPartition, HoldoutPartition)> {
    if table.len() <= holdout_size {
        return Err(PredictError::InsufficientData(format!(
            "{} valid feature row(s), more than {} required",
            table.len(),
            holdout_size
        )));
    }
    let mut rows = table.rows;
    let holdout = rows.split_off(rows.len() - holdout_size);
    Ok((TrainPartition { rows }, HoldoutPartition { rows: holdout }))
}
