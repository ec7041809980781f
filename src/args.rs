use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::catalog::Expressivity;

/// TTS QA - sample generation, listening-test server and score analysis
#[derive(Parser, Debug)]
#[clap(name = "tts-qa", version, about)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[clap(long, global = true, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate emotion-scaled samples through the vendor TTS API
    Generate(GenerateArgs),
    /// Run the listening-test web app
    Serve(ServeArgs),
    /// Summarise evaluator scores into reports and charts
    Analyze(AnalyzeArgs),
    /// Extract research insights and product issues from evaluator comments
    Comments(CommentsArgs),
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Vendor API bearer token
    #[clap(long, env = "TTS_API_TOKEN", hide_env_values = true)]
    pub token: String,

    #[clap(long, env = "TTS_API_BASE_URL", default_value = "https://dev.icepeak.ai")]
    pub base_url: String,

    #[clap(long, default_value = "public/voices")]
    pub out_dir: PathBuf,

    /// Expressivity variants to generate ("none", "0.6"); defaults to both
    #[clap(long = "expressivity")]
    pub expressivity: Vec<Expressivity>,

    /// JSON file replacing the built-in voice/emotion/text matrix
    #[clap(long)]
    pub catalog: Option<PathBuf>,

    #[clap(long, default_value_t = 4)]
    pub batch_size: usize,

    #[clap(long, default_value_t = 30)]
    pub poll_attempts: usize,

    #[clap(long, default_value_t = 3000)]
    pub poll_interval_ms: u64,

    /// Also generate neutral reference audio per voice, emotion and text category
    #[clap(long)]
    pub references: bool,

    /// Regenerate files that already exist on disk
    #[clap(long)]
    pub overwrite: bool,

    /// Print the plan without calling the API
    #[clap(long)]
    pub dry_run: bool,

    /// Where to write the sample metadata pool (default: sample_metadata.json next to <out-dir>)
    #[clap(long)]
    pub metadata: Option<PathBuf>,
}

impl GenerateArgs {
    pub fn expressivities(&self) -> Vec<Expressivity> {
        if self.expressivity.is_empty() {
            vec![Expressivity::None, Expressivity::Stabilized]
        } else {
            self.expressivity.clone()
        }
    }

    /// The pool sits beside the voices directory, where `serve` looks for it.
    pub fn metadata_path(&self) -> PathBuf {
        self.metadata.clone().unwrap_or_else(|| {
            self.out_dir
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("sample_metadata.json")
        })
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    #[clap(long, default_value_t = 5000)]
    pub port: u16,

    /// Holds sample_metadata.json, results.jsonl and session logs
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Audio directory served under /audio (default: <data-dir>/voices)
    #[clap(long)]
    pub voices_dir: Option<PathBuf>,

    #[clap(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[clap(long, default_value_t = 25)]
    pub session_size: usize,
}

impl ServeArgs {
    pub fn voices_dir(&self) -> PathBuf {
        self.voices_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("voices"))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    TradeOff,
    Expressivity,
    /// Scale where the 0.6 emotion advantage levels off
    Clipping,
    /// Critical (< 4) and high (>= 6) scores per metric
    Thresholds,
    TextCategories,
    EmotionGroups,
    /// Emotion group × text category by scale and expressivity
    EmotionText,
    All,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    #[clap(long, default_value = "current_evaluations.csv")]
    pub input: PathBuf,

    #[clap(long, default_value = "analysis_out")]
    pub out_dir: PathBuf,

    #[clap(long, value_enum, default_value_t = ReportKind::All)]
    pub report: ReportKind,

    /// Mean quality below which a scale is considered unacceptable
    #[clap(long, default_value_t = 4.0)]
    pub quality_threshold: f64,

    #[clap(long)]
    pub no_charts: bool,
}

#[derive(Parser, Debug)]
pub struct CommentsArgs {
    #[clap(long, default_value = "current_evaluations.csv")]
    pub input: PathBuf,

    #[clap(long, default_value = "analysis_out")]
    pub out_dir: PathBuf,
}
