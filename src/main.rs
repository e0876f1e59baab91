use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;

mod cli;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;
mod scheduler;
mod services;

use cli::{Cli, Command, SourceArgs};
use config::Config;
use db::Repository;
use error::Result;
use feed::{filter_links, LinkFilter, PageFetcher};
use models::ExtractedContent;
use pipeline::IngestionPipeline;
use services::{ContentExtractor, Notifier, TelegramNotifier};

#[tokio::main]
async fn main() -> ExitCode {
    // Credentials may come from a local .env file
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load()?;

    match cli.command.unwrap_or(Command::Run(SourceArgs::default())) {
        Command::Run(source) => {
            let verbose = source.verbose;
            source.apply(&mut config);
            let summary = run_once(&config).await?;
            print_summary(&summary, verbose);
        }

        Command::Schedule {
            source,
            time,
            utc_offset,
        } => {
            let verbose = source.verbose;
            source.apply(&mut config);
            if let Some(time) = time {
                config.schedule_time = time;
            }
            if let Some(hours) = utc_offset {
                config.schedule_utc_offset_hours = hours;
            }
            run_daily(&config, verbose).await?;
        }

        Command::Extract { source, output } => {
            let fetcher = PageFetcher::new(config.request_timeout_secs)?;
            let extractor = ContentExtractor::new(&config.extraction)?;
            let page = fetcher.fetch(&source).await?;
            let content = extractor.extract(&page.html);

            match output {
                Some(path) => {
                    tokio::fs::write(&path, render_extracted(&content)).await?;
                    println!("Article saved to: {}", path.display());
                    println!("Date: {}", content.date);
                    println!("Headline: {}", content.headline);
                    println!("Body length: {} characters", content.body.chars().count());
                }
                None => println!("{}", render_extracted(&content)),
            }
        }

        Command::Links {
            source,
            pattern,
            case_sensitive,
        } => {
            let fetcher = PageFetcher::new(config.request_timeout_secs)?;
            let links = fetcher.fetch(&source).await?.links();
            let links = match pattern {
                Some(pattern) => filter_links(&links, &pattern, case_sensitive)?,
                None => links,
            };
            for link in links {
                println!("{}", link);
            }
        }

        Command::Send {
            headline,
            url,
            date,
            body,
        } => {
            let notifier = TelegramNotifier::new(config.telegram());
            if !notifier.is_enabled() {
                eprintln!("Telegram credentials not configured (TELEGRAM_BOT_TOKEN, CHANNEL_ID)");
                return Ok(ExitCode::FAILURE);
            }
            if !notifier.send(&headline, &url, &date, &body).await {
                eprintln!("Failed to send to Telegram channel");
                return Ok(ExitCode::FAILURE);
            }
            println!("Sent to Telegram channel");
        }

        Command::Migrate { db_path } => {
            let db_path = db_path.unwrap_or(config.db_path);
            let repository = Repository::new(&db_path).await?;
            let report = repository.migrate_legacy_records().await?;
            let counts = repository.count_by_state().await?;
            println!("Published (older than 1 day): {}", report.published);
            println!("Unpublished (within 1 day): {}", report.unpublished);
            println!(
                "Store now holds {} published and {} unpublished articles",
                counts.published, counts.unpublished
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

impl SourceArgs {
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.source_url = url;
        }
        if let Some(pattern) = self.pattern {
            config.filter_pattern = pattern;
        }
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }
        if self.case_sensitive {
            config.case_sensitive = true;
        }
    }
}

async fn build_pipeline(config: &Config) -> Result<IngestionPipeline<TelegramNotifier>> {
    let repository = Repository::new(&config.db_path).await?;
    let fetcher = PageFetcher::new(config.request_timeout_secs)?;
    let extractor = ContentExtractor::new(&config.extraction)?;
    let notifier = TelegramNotifier::new(config.telegram());
    Ok(IngestionPipeline::new(repository, fetcher, extractor, notifier))
}

async fn run_once(config: &Config) -> Result<pipeline::RunSummary> {
    let filter = LinkFilter::new(&config.filter_pattern, config.case_sensitive)?;
    let pipeline = build_pipeline(config).await?;
    pipeline.run(&config.source_url, &filter).await
}

async fn run_daily(config: &Config, verbose: bool) -> Result<()> {
    let time = scheduler::parse_daily_time(&config.schedule_time)?;
    let offset = scheduler::utc_offset(config.schedule_utc_offset_hours)?;
    // Validate the pattern before the first wait
    LinkFilter::new(&config.filter_pattern, config.case_sensitive)?;

    loop {
        let next = scheduler::next_run_after(Utc::now(), time, offset);
        tracing::info!(
            next_run = %next.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S %:z"),
            "Waiting for next scheduled run"
        );
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Scheduler stopped");
                return Ok(());
            }
        }

        match run_once(config).await {
            Ok(summary) => print_summary(&summary, verbose),
            Err(e) => tracing::error!("Scheduled run failed: {}", e),
        }
    }
}

fn print_summary(summary: &pipeline::RunSummary, verbose: bool) {
    if verbose {
        println!("{:#}", summary);
    } else {
        println!("{}", summary);
    }
}

fn render_extracted(content: &ExtractedContent) -> String {
    format!(
        "Date: {}\n\nHeadline: {}\n\nText Body:\n{}\n",
        content.date, content.headline, content.body
    )
}
