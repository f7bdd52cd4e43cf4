use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
use config::DownloaderConfig;

mod downloader;
mod logging;
mod utils;

#[derive(Parser)]
#[command(name = "rangeget")]
#[command(about = "A concurrent HTTP file downloader")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "number of concurrent connections (default 4)")]
    concurrency: Option<usize>,
    #[arg(short, long, help = "output file/directory path")]
    output: Option<PathBuf>,
    #[arg(long, help = "TOML file with downloader settings")]
    config: Option<PathBuf>,
    #[arg(long, help = "maximum chunks fetched at once (default: one per chunk)")]
    workers: Option<usize>,
    #[arg(long, help = "timeout for each HTTP request, in seconds (default 30)")]
    timeout: Option<u64>,
    #[arg(long, help = "stop the remaining chunks as soon as one fails")]
    fail_fast: bool,
    #[arg(help = "URL to download")]
    url: Option<String>,
}

impl Cli {
    async fn load_config(&self) -> anyhow::Result<DownloaderConfig> {
        let mut config = match &self.config {
            Some(path) => DownloaderConfig::load_from_file(path).await?,
            None => DownloaderConfig::default(),
        };

        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(workers) = self.workers {
            config.max_workers = Some(workers);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }

        config.validate().context("invalid options")?;
        Ok(config)
    }
}

async fn run(cli: &Cli, url: &str) -> anyhow::Result<()> {
    let config = cli.load_config().await?;
    logging::init_logging(&config.log_level);

    let report = downloader::download(url, cli.output.as_deref(), &config)
        .await
        .with_context(|| format!("failed to download {}", url))?;

    let via = match report.chunks {
        0 => "a single connection".to_string(),
        n => format!("{} chunks", n),
    };
    println!(
        "Saved {} bytes to {} in {:.2?} ({})",
        report.bytes,
        report.path.display(),
        report.elapsed,
        via
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(url) = cli.url.as_deref() else {
        // Bare invocation behaves like -h.
        return match Cli::command().print_help() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("failed to print help: {}", err);
                ExitCode::FAILURE
            }
        };
    };

    match run(&cli, url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Download failed: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
