use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;
use zipalign::{cli, DEFAULT_ALIGNMENT};

#[derive(Parser)]
#[command(name = "zipalign")]
#[command(version)]
#[command(about = "Align stored entries of a ZIP archive to a byte boundary")]
struct Cli {
    /// Log every entry as it is processed
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an aligned copy of a ZIP archive
    Align {
        /// Path to input ZIP file
        input: PathBuf,

        /// Path for the aligned output ZIP file
        output: PathBuf,

        /// Alignment in bytes
        #[arg(short, long, default_value_t = DEFAULT_ALIGNMENT)]
        alignment: u32,

        /// Overwrite an existing output file
        #[arg(short, long)]
        force: bool,
    },

    /// Check that stored entries of a ZIP archive are aligned
    Check {
        /// Path to the ZIP file to check
        input: PathBuf,

        /// Alignment in bytes
        #[arg(short, long, default_value_t = DEFAULT_ALIGNMENT)]
        alignment: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Align { input, output, alignment, force } => {
            println!("Aligning zip {}", input.display());
            let start = Instant::now();

            let summary = cli::align_file(&input, &output, alignment, force)
                .with_context(|| format!("failed to align {}", input.display()))?;

            println!(
                "Zip aligned successfully, took {}ms ({} entries, {} padded)",
                start.elapsed().as_millis(),
                summary.entries,
                summary.padded_entries
            );
        }

        Commands::Check { input, alignment } => {
            println!("Verifying alignment of {} ({})...", input.display(), alignment);

            let report = cli::check_file(&input, alignment)
                .with_context(|| format!("failed to check {}", input.display()))?;

            let entries: Vec<_> = if args.verbose {
                report.entries.iter().collect()
            } else {
                report.failures().collect()
            };
            for entry in entries {
                println!(
                    "{}",
                    cli::describe_entry(entry.data_start, &entry.name, &entry.status)
                );
            }

            if report.is_aligned() {
                println!("Verification successful");
            } else {
                println!("Verification FAILED");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
