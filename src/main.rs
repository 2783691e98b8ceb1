use anyhow::{Context, Result};
use clap::Parser;
use listing_scout::scrapers::fetch::{BrowserRenderer, PageFetcher, DEFAULT_USER_AGENT};
use listing_scout::{
    ExtractOptions, HttpImageProbe, NoProbe, Page, Registry, RemoteExtractor,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TOKEN_ENV: &str = "LISTING_SCOUT_TOKEN";

/// Extract a structured real-estate listing from a web page
#[derive(Parser, Debug)]
#[command(name = "listing-scout", version)]
struct Args {
    /// Listing URL; also the canonical URL stamped on the result
    url: String,

    /// Read the page from this file instead of downloading it
    #[arg(long)]
    html: Option<PathBuf>,

    /// Render the page in headless Chrome before extracting
    #[arg(long, conflicts_with = "html")]
    render: bool,

    /// Seconds a rendered page is given to settle
    #[arg(long, default_value_t = 8)]
    settle_secs: u64,

    /// Base URL of the remote extraction service (token from LISTING_SCOUT_TOKEN)
    #[arg(long)]
    remote: Option<String>,

    /// Do not download images to measure them
    #[arg(long)]
    no_probe: bool,

    /// Per-image measurement timeout
    #[arg(long, default_value_t = 3000)]
    image_timeout_ms: u64,

    /// Upper bound on returned images
    #[arg(long, default_value_t = 20)]
    max_images: usize,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries only the listing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let html = acquire(&args).await?;
    let page = Page::parse(&html, &args.url).context("Failed to read page")?;

    let options = ExtractOptions::default()
        .image_timeout(Duration::from_millis(args.image_timeout_ms))
        .max_images(args.max_images);

    let listing = match &args.remote {
        Some(endpoint) => {
            let token = std::env::var(TOKEN_ENV).ok();
            let remote = RemoteExtractor::new(endpoint, token)?.options(options);
            info!("Using remote extraction at {}", remote.endpoint());
            remote
                .extract_page(&page)
                .await
                .context("Remote extraction failed")?
        }
        None => {
            let registry = if args.no_probe {
                Registry::with_options(NoProbe, options)
            } else {
                Registry::with_options(HttpImageProbe::new(DEFAULT_USER_AGENT)?, options)
            };
            registry.extract_page(&page).await
        }
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&listing)?
    } else {
        serde_json::to_string(&listing)?
    };
    println!("{}", json);

    Ok(())
}

async fn acquire(args: &Args) -> Result<String> {
    if let Some(path) = &args.html {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    if args.render {
        let url = args.url.clone();
        let settle = Duration::from_secs(args.settle_secs);
        return tokio::task::spawn_blocking(move || BrowserRenderer::new(settle)?.render(&url))
            .await
            .context("Browser task panicked")?;
    }
    PageFetcher::new()?.fetch(&args.url).await
}
