//! Run command - all three runs, then the boundary merge.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use tiledrape::config::ConfigFile;
use tiledrape::pipeline::PipelineReport;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub threads: Option<usize>,
    pub max_attempts: Option<u32>,
}

impl RunArgs {
    /// Overlay command line values on the loaded configuration.
    fn apply(&self, config: &mut ConfigFile) {
        if let Some(threads) = self.threads {
            config.scheduler.threads = threads;
        }
        if let Some(attempts) = self.max_attempts {
            config.scheduler.max_attempts = attempts;
        }
    }
}

pub fn run(mut runner: CliRunner, args: RunArgs) -> Result<(), CliError> {
    args.apply(runner.config_mut());
    runner.log_startup("run");

    let runtime = runner.runtime()?;
    let store = runner.connect(&runtime)?;
    let pipeline = runner.pipeline(store);

    // Ctrl-C stops dispatching and kills running tool processes
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let report = pipeline.run(&cancel)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!();
    for run in &report.runs {
        println!(
            "{:<12} {:>5} tiles  {:>5} produced  {:>5} skipped  {} attempts  {:>7} buildings",
            run.variant.name(),
            run.summary.requested,
            run.summary.produced.len(),
            run.summary.skipped.len(),
            run.summary.attempts,
            run.published
        );
    }

    let skipped = report.permanently_skipped();
    if !skipped.is_empty() {
        println!();
        println!("Tiles without output:");
        for (tile, reason) in &skipped {
            println!("  {}: {}", tile, reason);
        }
    }

    println!();
    match report.final_rows {
        Some(rows) => println!("{} buildings in {}", rows, report.final_table),
        None => println!("Cancelled before merge; {} was not written", report.final_table),
    }
}
