use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ntuple", about = "Inspect, dump and convert event ntuple files")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// JSON lines
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the number of events in a file
    Count {
        /// Input file
        file: PathBuf,
    },
    /// Print events as JSON lines
    Dump {
        /// Input file
        file: PathBuf,
        /// Index of the first event to print
        #[arg(long, default_value_t = 0)]
        first: u64,
        /// Maximum number of events to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show layout, title and columns of a file
    Inspect {
        /// Input file
        file: PathBuf,
    },
    /// Rewrite a file (legacy or current) in the current layout
    Convert {
        /// Input file
        input: PathBuf,
        /// Output file, truncated if it exists
        output: PathBuf,
        /// Title of the output table (defaults to the input title)
        #[arg(long)]
        title: Option<String>,
        /// Entries per basket in the output
        #[arg(long, default_value_t = 1000)]
        basket_entries: usize,
        /// Write HepMC2 text instead of an ntuple file
        #[cfg(feature = "hepmc2")]
        #[arg(long, conflicts_with_all = ["title", "basket_entries"])]
        to_hepmc: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump() {
        let cli = Cli::parse_from(["ntuple", "dump", "in.ntpl", "--first", "3", "--limit", "2"]);
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Command::Dump { file, first, limit } => {
                assert_eq!(file, PathBuf::from("in.ntpl"));
                assert_eq!(first, 3);
                assert_eq!(limit, Some(2));
            }
            _ => panic!("expected dump"),
        }
    }

    #[test]
    fn test_global_log_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "ntuple",
            "convert",
            "a.ntpl",
            "b.ntpl",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(
            cli.command,
            Command::Convert {
                basket_entries: 1000,
                title: None,
                ..
            }
        ));
    }

    #[cfg(feature = "hepmc2")]
    #[test]
    fn test_parse_convert_to_hepmc() {
        let cli = Cli::parse_from(["ntuple", "convert", "a.ntpl", "b.hepmc", "--to-hepmc"]);
        assert!(matches!(cli.command, Command::Convert { to_hepmc: true, .. }));

        let clash = Cli::try_parse_from(["ntuple", "convert", "a", "b", "--to-hepmc", "--title", "t"]);
        assert!(clash.is_err());
    }
}
