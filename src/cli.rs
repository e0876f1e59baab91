//! Command-line interface.
//!
//! Every option left unset falls back to the config file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the category page once, store new articles and relay them
    Run(SourceArgs),

    /// Run daily at a fixed wall-clock time until interrupted
    Schedule {
        #[command(flatten)]
        source: SourceArgs,

        /// Time of day to run, HH:MM
        #[arg(long)]
        time: Option<String>,

        /// Hours east of UTC the time is expressed in
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<i32>,
    },

    /// Print the date, headline and body extracted from a URL or HTML file
    Extract {
        source: String,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the links found on a page, optionally filtered
    Links {
        source: String,

        /// Substring or glob pattern (e.g. "*/2025/*")
        #[arg(short, long)]
        pattern: Option<String>,

        #[arg(short, long)]
        case_sensitive: bool,
    },

    /// Send a single notification to the configured channel
    Send {
        headline: String,
        url: String,
        #[arg(default_value = "")]
        date: String,
        #[arg(default_value = "")]
        body: String,
    },

    /// Re-run the age-based publication state backfill on a store
    Migrate {
        #[arg(long)]
        db_path: Option<String>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct SourceArgs {
    /// Category page to scrape (URL or local HTML file)
    #[arg(long)]
    pub url: Option<String>,

    /// Substring or glob pattern candidate links must match
    #[arg(long)]
    pub pattern: Option<String>,

    /// Path to the SQLite store
    #[arg(long)]
    pub db_path: Option<String>,

    #[arg(long)]
    pub case_sensitive: bool,

    /// List the outcome for every candidate link after each run
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::parse_from([
            "headline-relay",
            "run",
            "--url",
            "https://news.example/category/ai/",
            "--pattern",
            "*/2026/*",
            "--db-path",
            "news.db",
        ]);

        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.url.as_deref(), Some("https://news.example/category/ai/"));
        assert_eq!(args.pattern.as_deref(), Some("*/2026/*"));
        assert_eq!(args.db_path.as_deref(), Some("news.db"));
        assert!(!args.case_sensitive);
        assert!(!args.verbose);
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::parse_from(["headline-relay"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn send_defaults_optional_fields() {
        let cli = Cli::parse_from(["headline-relay", "send", "Title", "https://news.example/a"]);
        let Some(Command::Send { date, body, .. }) = cli.command else {
            panic!("expected send command");
        };
        assert!(date.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    fn schedule_accepts_negative_offsets() {
        let cli = Cli::parse_from(["headline-relay", "schedule", "--time", "08:30", "--utc-offset", "-5"]);
        let Some(Command::Schedule { time, utc_offset, .. }) = cli.command else {
            panic!("expected schedule command");
        };
        assert_eq!(time.as_deref(), Some("08:30"));
        assert_eq!(utc_offset, Some(-5));
    }
}
