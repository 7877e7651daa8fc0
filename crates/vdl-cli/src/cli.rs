use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vdl",
    about = "Verdict Ledger: tamper-evident log of audio deepfake verdicts",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum VerdictLabel {
    Real,
    Fake,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the ledger and write the genesis block
    Init(InitArgs),
    /// Record a verdict as a new block
    Record(RecordArgs),
    /// Show block history
    Log(LogArgs),
    /// Show a specific block
    Show(ShowArgs),
    /// Verify hash chain integrity
    Verify(VerifyArgs),
    /// Show verdict counts
    Summary(SummaryArgs),
    /// Start the upload server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InitArgs {}

#[derive(Args)]
pub struct RecordArgs {
    #[arg(short, long, value_enum)]
    pub label: VerdictLabel,
    /// Confidence in [0, 1]; defaults to 1 for real and 0 for fake
    #[arg(long)]
    pub confidence: Option<f64>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub index: u64,
}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct SummaryArgs {}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}
