//! Over/under prediction for a player's next game.
//!
//! Every request refits from scratch: window → features → split → scaler →
//! classifier → report. Nothing learned is kept between requests.

pub mod classifier;
pub mod error;
pub mod features;
pub mod report;
pub mod scaler;
pub mod split;
pub mod window;

pub use classifier::{ClassifierConfig, LogisticClassifier};
pub use error::PredictError;
pub use report::{OverUnderHistory, Prediction};

use tracing::{debug, info};

use crate::stats::{GameLogProvider, GameRecord};
use classifier::evaluate;
use features::FeatureBuilder;
use report::ModelSummary;
use scaler::Scaler;
use window::GameLogWindow;

/// Settings for one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub season: String,
    /// Games kept for modelling; fewer available is an error
    pub window_cap: usize,
    pub holdout_size: usize,
    pub rolling_windows: Vec<usize>,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            season: "2024-25".into(),
            window_cap: 20,
            holdout_size: 5,
            rolling_windows: vec![3, 5],
            classifier: ClassifierConfig::default(),
        }
    }
}

/// A single prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub player: String,
    pub threshold: f64,
    /// Whether the upcoming game is at home
    pub is_home: bool,
}

fn check_threshold(threshold: f64) -> error::Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(PredictError::InvalidInput(format!(
            "point threshold must be a non-negative number, got {}",
            threshold
        )));
    }
    Ok(())
}

/// Run the pipeline over already-retrieved game logs.
pub fn predict_from_records(
    records: &[GameRecord],
    request: &PredictRequest,
    config: &PipelineConfig,
) -> error::Result<Prediction> {
    check_threshold(request.threshold)?;

    let window = GameLogWindow::new(records, config.window_cap)?;
    debug!(
        "{}: {} of {} game(s) retained",
        request.player,
        window.len(),
        records.len()
    );
    let builder = FeatureBuilder::new(&window, &config.rolling_windows);
    let table = builder.build(request.threshold);
    let keys = builder.keys().to_vec();
    debug!(
        "Feature table: {} row(s) x {} column(s)",
        table.len(),
        keys.len()
    );

    let (train, holdout) = split::split(table, config.holdout_size)?;
    if let (Some(first), Some(last)) = (holdout.rows().first(), holdout.rows().last()) {
        debug!(
            "Split: {} training row(s), {} holdout row(s) from {} to {}",
            train.len(),
            holdout.len(),
            first.game_date,
            last.game_date
        );
    }

    let scaler = Scaler::fit(&train);
    let x_train = scaler.transform_rows(train.values());
    let x_holdout = scaler.transform_rows(holdout.values());
    let upcoming = builder.build_upcoming(request.is_home);
    debug!(
        "Upcoming game features: {}",
        upcoming
            .features()
            .map(|f| format!("{}={:.3}", f.key, f.value))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let x_next = scaler.transform_upcoming(&upcoming);

    let model = LogisticClassifier::fit(&x_train, &train.labels(), &config.classifier)?;
    debug!(
        "Model fitted in {} iteration(s) ({:?}), intercept {:.4}",
        model.iterations(),
        model.status(),
        model.intercept()
    );
    let evaluation = evaluate(&model, &x_holdout, &holdout.labels());
    let over = model.predict(&x_next);
    let probability = model.predict_probability(&x_next);

    info!(
        "{} vs {:.1} pts: {} (p={:.3}, holdout accuracy {:.2})",
        request.player,
        request.threshold,
        report::Outcome::from_label(over),
        probability,
        evaluation.accuracy
    );

    Ok(report::assemble(
        &request.player,
        request.threshold,
        &window,
        ModelSummary {
            evaluation,
            over,
            probability,
            feature_importance: model.feature_importance(&keys),
            training_rows: train.len(),
            holdout_rows: holdout.len(),
        },
    ))
}

/// Resolve the player, fetch their season logs and predict the next game.
pub async fn predict_over_under(
    provider: &dyn GameLogProvider,
    request: &PredictRequest,
    config: &PipelineConfig,
) -> error::Result<Prediction> {
    check_threshold(request.threshold)?;
    let records = fetch_player_logs(provider, &request.player, &config.season).await?;
    predict_from_records(&records, request, config)
}

/// Season-long over/under record at a threshold.
pub async fn player_over_under_history(
    provider: &dyn GameLogProvider,
    player: &str,
    threshold: f64,
    season: &str,
) -> error::Result<OverUnderHistory> {
    check_threshold(threshold)?;
    let records = fetch_player_logs(provider, player, season).await?;
    Ok(report::over_under_history(&records, threshold))
}

async fn fetch_player_logs(
    provider: &dyn GameLogProvider,
    player: &str,
    season: &str,
) -> error::Result<Vec<GameRecord>> {
    let info = provider
        .find_player(player)
        .await
        .map_err(PredictError::upstream)?
        .ok_or_else(|| PredictError::NotFound(player.to_string()))?;
    debug!(
        "Resolved '{}' to {} ({}) via {}",
        player,
        info.full_name,
        info.id,
        provider.name()
    );

    provider
        .fetch_game_logs(info.id, season)
        .await
        .map_err(PredictError::upstream)
}
