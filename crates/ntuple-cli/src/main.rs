use std::io;

use clap::Parser;
use ntuple_cli::commands;
use ntuple_cli::config::{Cli, Command, LogFormat};
use ntuple_logging::{LogConfig, SubscriberBuilder};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let config = match cli.log_format {
        LogFormat::Pretty => LogConfig::development(),
        LogFormat::Json => LogConfig::default(),
    };
    let _guard = SubscriberBuilder::new()
        .with_config(config)
        .with_level(&cli.log_level)
        .init()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Count { file } => {
            commands::count(&file, &mut out)?;
        }

        Command::Dump { file, first, limit } => {
            let summary = commands::dump(&file, first, limit, &mut out, &mut io::stderr())?;
            if summary.failed > 0 {
                eprintln!("{} of {} entries could not be read", summary.failed, summary.printed + summary.failed);
            }
        }

        Command::Inspect { file } => {
            commands::inspect(&file, &mut out)?;
        }

        Command::Convert {
            input,
            output,
            title,
            basket_entries,
            #[cfg(feature = "hepmc2")]
            to_hepmc,
        } => {
            #[cfg(feature = "hepmc2")]
            if to_hepmc {
                commands::convert_to_hepmc(&input, &output, &mut out)?;
                return Ok(());
            }
            commands::convert(&input, &output, title.as_deref(), basket_entries, &mut out)?;
        }
    }

    Ok(())
}
