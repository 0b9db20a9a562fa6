use clap::Parser;

use crate::predict::{ClassifierConfig, PipelineConfig};

/// Player points over/under prediction service
#[derive(Parser, Debug, Clone)]
#[command(name = "fastbreak-bets", version, about)]
pub struct Config {
    /// API listen address
    #[arg(long, env = "API_ADDR", default_value = "127.0.0.1:5000")]
    pub api_addr: String,

    /// Season whose game logs feed the model (e.g. 2024-25)
    #[arg(long, env = "SEASON", default_value = "2024-25")]
    pub season: String,

    /// NBA stats API base URL
    #[arg(long, env = "NBA_STATS_URL", default_value = "https://stats.nba.com/stats")]
    pub nba_stats_url: String,

    /// HTTP timeout for stats requests, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,

    /// Minimum spacing between consecutive stats requests, in milliseconds
    #[arg(long, env = "REQUEST_SPACING_MS", default_value = "600")]
    pub request_spacing_ms: u64,

    /// Origins allowed to call the API from a browser
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Number of most recent games kept for modelling
    #[arg(long, env = "WINDOW_CAP", default_value = "20")]
    pub window_cap: usize,

    /// Number of chronologically final feature rows held out for evaluation
    #[arg(long, env = "HOLDOUT_SIZE", default_value = "5")]
    pub holdout_size: usize,

    /// Rolling window sizes used for features
    #[arg(long, env = "ROLLING_WINDOWS", value_delimiter = ',', default_value = "3,5")]
    pub rolling_windows: Vec<usize>,

    /// Inverse L2 regularisation strength (larger = weaker penalty)
    #[arg(long, env = "INVERSE_REGULARIZATION", default_value = "1.0")]
    pub inverse_regularization: f64,

    /// Maximum optimizer iterations for the classifier
    #[arg(long, env = "MAX_ITERATIONS", default_value = "5000")]
    pub max_iterations: usize,

    /// Seed for classifier initialisation
    #[arg(long, env = "MODEL_SEED", default_value = "42")]
    pub model_seed: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_cap < 2 {
            anyhow::bail!("window_cap must be at least 2");
        }
        if self.holdout_size == 0 {
            anyhow::bail!("holdout_size must be at least 1");
        }
        if self.rolling_windows.is_empty() {
            anyhow::bail!("at least one rolling window is required");
        }
        if self
            .rolling_windows
            .iter()
            .any(|&w| w == 0 || w >= self.window_cap)
        {
            anyhow::bail!(
                "rolling windows must be between 1 and {} (exclusive of window_cap)",
                self.window_cap
            );
        }
        if !(self.inverse_regularization > 0.0 && self.inverse_regularization.is_finite()) {
            anyhow::bail!("inverse_regularization must be a positive number");
        }
        if self.max_iterations == 0 {
            anyhow::bail!("max_iterations must be at least 1");
        }
        if self.request_spacing_ms > 60_000 {
            anyhow::bail!("request_spacing_ms must not exceed 60000");
        }
        Ok(())
    }

    /// Pipeline settings handed to every prediction request.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            season: self.season.clone(),
            window_cap: self.window_cap,
            holdout_size: self.holdout_size,
            rolling_windows: self.rolling_windows.clone(),
            classifier: ClassifierConfig {
                inverse_regularization: self.inverse_regularization,
                max_iterations: self.max_iterations,
                seed: self.model_seed,
                ..ClassifierConfig::default()
            },
        }
    }
}
