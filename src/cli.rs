use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "reef-worker")]
#[command(about = "Job worker for regional/suitability reef assessments", long_about = None)]
pub struct Cli {
    /// Load and validate configuration, print a summary, then exit
    /// without polling. Useful as a container health-check probe.
    #[arg(long)]
    pub config_check: bool,
}
