use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use bookfind::config::{Args, Config, Format};
use bookfind::fetcher::{self, Page};
use bookfind::{archiver, isbn, parser, report};

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(&Config::from(args))
}

fn run(config: &Config) -> Result<()> {
    let isbn = isbn::validate(&config.isbn)?;
    let html = load_page(config, &isbn)?;

    let results = parser::parse_document(&html);
    info!(
        new = results.new_offers.len(),
        used = results.used_offers.len(),
        "results page parsed"
    );
    if results.metadata.title.is_none() {
        bail!("no book could be found for {isbn}");
    }

    let rendered = match config.format {
        Format::Console => report::render_console(&results, config.selection, config.color),
        Format::Csv => report::render_csv(&results, config.selection)?,
        Format::Json => {
            let archive = archiver::Archive::new(&isbn, &config.currency, &results, config.selection);
            archiver::render_json(&archive)?
        }
    };

    match &config.output {
        Some(path) => {
            archiver::save_to_file(rendered.as_bytes(), path)?;
            info!(path = %path.display(), "report saved");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn load_page(config: &Config, isbn: &str) -> Result<String> {
    let page = match &config.input {
        Some(path) => Page {
            body: std::fs::read(path)
                .with_context(|| format!("unable to read {}", path.display()))?,
            charset: None,
        },
        None => {
            let url = fetcher::search_url(&config.base_url, isbn, &config.currency)?;
            let page = fetcher::fetch_page(&url, config.timeout)?;
            if let Some(path) = &config.save_html {
                archiver::save_to_file(&page.body, path)?;
            }
            page
        }
    };
    Ok(fetcher::decode_page(&page)?)
}
