use anyhow::Context;
use clap::Parser;
use colored::*;
use homberger_processor::cli::{self, Args};
use homberger_processor::processor::{BatchProcessor, print_summary};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::warn;

fn main() {
    let args = Args::parse();

    if let Err(error) = cli::setup_logging(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let code = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        // Ctrl+C only raises the token; the batch stops between items
        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                    signal_token.cancel();
                }
                Err(e) => warn!("Failed to install CTRL+C signal handler: {}", e),
            }
        });

        match run(args, cancellation_token).await {
            Ok(code) => code,
            Err(error) => {
                eprintln!("Error: {:#}", error);
                1
            }
        }
    });

    process::exit(code);
}

async fn run(args: Args, cancel: CancellationToken) -> anyhow::Result<i32> {
    let config = args.to_config()?;
    let processor = BatchProcessor::new(config).context("Failed to set up converter")?;

    if args.single {
        let Some(input) = args.inputs.first() else {
            anyhow::bail!("No input given");
        };

        // Runs to completion; an interrupt never splits the artifact pair
        let report = processor
            .convert_instance(input)
            .await
            .with_context(|| format!("Failed to convert {}", input.display()))?;
        println!(
            "{} {} -> {}",
            "Converted".bright_green().bold(),
            report.instance_name,
            report.artifacts.customers.display()
        );
        return Ok(0);
    }

    println!(
        "{}",
        "Starting Homberger instance conversion".bright_green().bold()
    );
    println!(
        "  {} {}",
        "Inputs:".bright_cyan(),
        args.inputs.len().to_string().bright_white()
    );

    let summary = processor.process(&args.inputs, cancel).await?;
    print_summary(&summary, &processor.config().output_dir);

    Ok(cli::exit_code(&summary, processor.accepts(&summary)))
}
