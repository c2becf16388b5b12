use anyhow::Context;
use clap::Parser;
use logsift::{Analyzer, AnalyzerConfig, LogLevel};
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "logsift", version, about = "Cluster the errors in a log file")]
struct Cli {
    /// Log file (.log, .txt or .gz), or `-` for stdin
    input: String,

    /// Name used to detect compression when reading stdin
    #[arg(long = "stdin-name", default_value = "stdin.log")]
    stdin_name: String,

    #[arg(long = "max-clusters", default_value_t = 10)]
    max_clusters: usize,
    /// Minimum level for warnings to count as high-signal
    #[arg(long = "min-level", default_value = "WARN")]
    min_level: LogLevel,
    #[arg(long = "min-cluster-size", default_value_t = 2)]
    min_cluster_size: usize,
    #[arg(long = "max-features", default_value_t = 1000)]
    max_features: usize,
    /// Number of templates in the output
    #[arg(long = "top", default_value_t = 10)]
    top: usize,
    /// Ask the configured summarizer for a prose summary
    #[arg(long = "summarize", default_value_t = false)]
    summarize: bool,

    /// Compact JSON on one line
    #[arg(long = "compact", default_value_t = false)]
    compact: bool,
    #[arg(long = "verbose", short = 'v', default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "logsift=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AnalyzerConfig {
        max_clusters: cli.max_clusters,
        min_level: cli.min_level,
        summarize: cli.summarize,
        min_cluster_size: cli.min_cluster_size,
        max_features: cli.max_features,
        top_templates: cli.top,
        ..AnalyzerConfig::default()
    };
    let analyzer = Analyzer::new(config).context("invalid configuration")?;

    let result = if cli.input == "-" {
        analyzer.analyze(io::stdin().lock(), &cli.stdin_name)
    } else {
        analyzer.analyze_path(&cli.input)
    }
    .with_context(|| format!("failed to analyze {}", cli.input))?;

    let out = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{out}");
    Ok(())
}
