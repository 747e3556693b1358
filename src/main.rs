use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use rss_combiner::config::Settings;
use rss_combiner::feed::{build_client, ChannelInfo, SourceList};
use rss_combiner::pipeline::{combine, CombineRequest};

#[derive(Parser, Debug)]
#[command(
    name = "rss-combiner",
    version,
    about = "Merge several RSS/Atom feeds into a single RSS 2.0 feed"
)]
#[command(group(ArgGroup::new("source").required(true).args(["config", "csv_url"])))]
struct Args {
    /// JSON file listing feeds: {"feeds": ["https://...", ...]}
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Published spreadsheet (CSV export) with feed URLs in the first column
    #[arg(long, value_name = "URL")]
    csv_url: Option<String>,

    /// Where to write the combined feed
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Channel title (overrides the settings file)
    #[arg(long)]
    title: Option<String>,

    /// Drop entries whose link already appeared
    #[arg(long)]
    no_duplicates: bool,

    /// Settings file [default: ~/.config/rss-combiner/settings.toml]
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Allow feeds on localhost and private networks
    #[arg(long)]
    allow_private_hosts: bool,
}

impl Args {
    fn source_list(&self) -> Result<SourceList> {
        match (&self.config, &self.csv_url) {
            (Some(path), None) => Ok(SourceList::ConfigFile(path.clone())),
            (None, Some(url)) => Ok(SourceList::Spreadsheet(url.clone())),
            _ => anyhow::bail!("Exactly one of --config or --csv-url is required"),
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match args.settings.as_deref() {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => match Settings::default_path() {
            Some(path) => Settings::load(&path)
                .with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
            None => Settings::default(),
        },
    };

    if let Some(title) = &args.title {
        settings.title = title.clone();
    }
    if args.allow_private_hosts {
        settings.allow_private_hosts = true;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the summary line
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    let client = build_client(&settings).context("Failed to build HTTP client")?;

    let request = CombineRequest {
        sources: args.source_list()?,
        output: args.output.clone(),
        channel: ChannelInfo {
            title: settings.title.clone(),
            link: settings.channel_link.clone(),
            description: settings.channel_description.clone(),
        },
        dedup: args.no_duplicates,
    };

    let summary = combine(&client, &settings, &request)
        .await
        .context("Failed to combine feeds")?;

    println!(
        "Wrote {} entries to {}",
        summary.entries,
        request.output.display()
    );
    if summary.failed > 0 {
        println!(
            "{} of {} sources could not be fetched (see log for details)",
            summary.failed, summary.sources
        );
    }

    Ok(())
}
