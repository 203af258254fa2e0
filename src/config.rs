use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::fetcher::DEFAULT_BASE_URL;
use crate::report::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Console,
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "bookfind", version, about = "Find books at the best price")]
pub struct Args {
    /// SBN, ISBN-10 or ISBN-13 number to search
    pub isbn: String,

    /// 3 letter currency symbol
    #[arg(short, long, value_name = "SYM", default_value = "EUR", value_parser = parse_currency)]
    pub currency: String,

    /// Limit the number of results per table (0 = no limit)
    #[arg(short, long, value_name = "NUM", default_value_t = 0)]
    pub limit: usize,

    /// Search for new books (default)
    #[arg(short, long)]
    pub new: bool,

    /// Search for used books
    #[arg(short, long)]
    pub used: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Console)]
    pub format: Format,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Disable ANSI colors in console output
    #[arg(long)]
    pub no_color: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Search endpoint
    #[arg(long, env = "BOOKFIND_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Parse a saved results page instead of fetching one
    #[arg(long, value_name = "FILE", conflicts_with = "save_html")]
    pub input: Option<PathBuf>,

    /// Keep a copy of the fetched page
    #[arg(long, value_name = "FILE")]
    pub save_html: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

fn parse_currency(value: &str) -> Result<String, String> {
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(value.to_ascii_uppercase())
    } else {
        Err(format!("expected a 3 letter currency code, got '{value}'"))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub isbn: String,
    pub currency: String,
    pub selection: Selection,
    pub format: Format,
    pub output: Option<PathBuf>,
    pub color: bool,
    pub timeout: Duration,
    pub base_url: String,
    pub input: Option<PathBuf>,
    pub save_html: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            isbn: args.isbn,
            currency: args.currency,
            selection: Selection {
                new: args.new || !args.used,
                used: args.used,
                limit: args.limit,
            },
            format: args.format,
            // escape codes only make sense on a terminal listing
            color: !args.no_color && args.output.is_none(),
            output: args.output,
            timeout: Duration::from_secs(args.timeout),
            base_url: args.base_url,
            input: args.input,
            save_html: args.save_html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> Config {
        Args::try_parse_from(std::iter::once("bookfind").chain(argv.iter().copied()))
            .unwrap()
            .into()
    }

    #[test]
    fn defaults() {
        let cfg = config(&["9780441478125"]);
        assert_eq!(cfg.currency, "EUR");
        assert_eq!(cfg.selection, Selection { new: true, used: false, limit: 0 });
        assert_eq!(cfg.format, Format::Console);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(cfg.color);
    }

    #[test]
    fn used_alone_hides_new() {
        let cfg = config(&["-u", "9780441478125"]);
        assert_eq!(cfg.selection, Selection { new: false, used: true, limit: 0 });

        let cfg = config(&["-u", "-n", "-l", "3", "9780441478125"]);
        assert_eq!(cfg.selection, Selection { new: true, used: true, limit: 3 });
    }

    #[test]
    fn currency_is_uppercased_and_checked() {
        assert_eq!(config(&["-c", "usd", "1"]).currency, "USD");
        assert!(Args::try_parse_from(["bookfind", "-c", "dollars", "1"]).is_err());
        assert!(Args::try_parse_from(["bookfind", "-c", "U$D", "1"]).is_err());
    }

    #[test]
    fn file_output_is_uncolored() {
        let cfg = config(&["-f", "csv", "-o", "out.csv", "1"]);
        assert_eq!(cfg.format, Format::Csv);
        assert!(!cfg.color);
    }

    #[test]
    fn input_and_save_html_conflict() {
        assert!(Args::try_parse_from(["bookfind", "--input", "a.html", "--save-html", "b.html", "1"]).is_err());
    }
}
