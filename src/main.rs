use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use dns_compare::{AppConfig, OutputFormat, ProberKind};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Compare latency to popular domains through competing DNS providers", long_about = None)]
struct Args {
    /// Config file; defaults to the per-user config if it exists.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How many domains to measure, from the top of the list.
    #[arg(short, long)]
    domains: Option<usize>,

    /// Echo requests per probe; the minimum is kept.
    #[arg(short, long)]
    best_of: Option<u32>,

    /// Maximum measurements in flight.
    #[arg(short = 'j', long, conflicts_with = "unlimited")]
    max_in_flight: Option<usize>,

    /// Run every measurement at once.
    #[arg(long)]
    unlimited: bool,

    #[arg(long, value_enum)]
    prober: Option<ProberKind>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the effective config to this path and exit.
    #[arg(long)]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(n) = self.domains {
            config.num_domains = n;
        }
        if let Some(n) = self.best_of {
            config.best_of = n;
        }
        if self.unlimited {
            config.max_in_flight = None;
        } else if let Some(n) = self.max_in_flight {
            config.max_in_flight = Some(n);
        }
        if let Some(prober) = self.prober {
            config.prober = prober;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        info!("wrote {}", path.display());
        return Ok(());
    }

    let report = until_interrupted(dns_compare::run(&config), tokio::signal::ctrl_c()).await?;

    print!("{}", report.render(args.format)?);
    Ok(())
}

/// Drive `work` to completion unless `interrupt` fires first.
///
/// If the interrupt listener itself fails, the work carries on uninterrupted.
async fn until_interrupted<T, E>(
    work: impl Future<Output = Result<T, E>>,
    interrupt: impl Future<Output = io::Result<()>>,
) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => Ok(result?),
        signal = interrupt => match signal {
            Ok(()) => bail!("interrupted"),
            Err(e) => {
                warn!("cannot listen for ctrl-c, running without it: {e}");
                Ok(work.await?)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::future;
    use std::time::Duration;

    use super::*;

    async fn slow_answer() -> Result<u32, io::Error> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(42)
    }

    #[tokio::test]
    async fn interrupt_stops_the_work() {
        let err = until_interrupted(slow_answer(), async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.to_string(), "interrupted");
    }

    #[tokio::test]
    async fn failed_listener_lets_the_work_finish() {
        let broken = async { Err(io::Error::other("no signal handler")) };
        assert_eq!(until_interrupted(slow_answer(), broken).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn work_finishes_without_interrupt() {
        let never = future::pending::<io::Result<()>>();
        assert_eq!(until_interrupted(slow_answer(), never).await.unwrap(), 42);
    }
}
