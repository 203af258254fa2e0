//! Ranking and rendering of extracted offers.

use std::cmp::Ordering;
use std::fmt::Write as _;

use thiserror::Error;

use crate::models::{BookMetadata, Condition, Offer, SearchResults};

const JUSTIFY: usize = 11;
const LINE_LEN: usize = 80;

const RED: &str = "\x1b[91m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const RESET: &str = "\x1b[00m";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv output failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv output failed: {0}")]
    CsvFlush(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
    #[error("csv output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which tables to report and how many offers from each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub new: bool,
    pub used: bool,
    /// 0 means no limit.
    pub limit: usize,
}

impl Selection {
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if self.new {
            conditions.push(Condition::New);
        }
        if self.used {
            conditions.push(Condition::Used);
        }
        conditions
    }
}

pub fn offers_for(results: &SearchResults, condition: Condition) -> &[Offer] {
    match condition {
        Condition::New => &results.new_offers,
        Condition::Used => &results.used_offers,
    }
}

/// Cheapest first, by normalized price. Offers without a price are
/// skipped; priced offers whose text holds no number go last.
pub fn rank(offers: &[Offer], limit: usize) -> Vec<&Offer> {
    let mut ranked: Vec<&Offer> = offers.iter().filter(|o| o.price.is_some()).collect();
    ranked.sort_by(|a, b| match (a.price_value, b.price_value) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    if limit > 0 {
        ranked.truncate(limit);
    }
    ranked
}

struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn write_aligned(out: &mut String, header: &str, lines: &[&str], color: Option<(&Palette, &str)>, gap: usize) {
    let pad = " ".repeat(gap);
    let header = format!("{header:<width$}", width = JUSTIFY);
    let header = match color {
        Some((palette, code)) => palette.paint(code, &header),
        None => header,
    };
    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 {
            let _ = writeln!(out, "{pad}{header} : {}", line.trim());
        } else {
            let _ = writeln!(out, "{pad}{:width$}   {}", "", line.trim(), width = JUSTIFY);
        }
    }
}

fn or_dash(value: Option<&String>) -> &str {
    value.map_or("-", String::as_str)
}

/// Terminal listing. The cheapest offer of each table is printed last so it
/// stays next to the prompt; the book details close the report.
pub fn render_console(results: &SearchResults, selection: Selection, color: bool) -> String {
    let palette = Palette { color };
    let mut out = String::new();

    for condition in selection.conditions().into_iter().rev() {
        out.push('\n');
        for offer in rank(offers_for(results, condition), selection.limit).into_iter().rev() {
            let _ = writeln!(out, "{}", "-".repeat(LINE_LEN / 2));
            let _ = writeln!(out, "{} : {}", palette.paint(RED, "Price"), or_dash(offer.price.as_ref()));
            write_aligned(&mut out, "Date", &[or_dash(offer.date.as_ref())], None, 4);
            let description: Vec<&str> = offer.description.iter().map(String::as_str).collect();
            write_aligned(&mut out, "Description", &description, None, 4);
            write_aligned(&mut out, "URL", &[or_dash(offer.url.as_ref())], None, 4);
            out.push('\n');
        }
        let heading = match condition {
            Condition::New => "New books",
            Condition::Used => "Used books",
        };
        let _ = writeln!(out, "{}", palette.paint(GREEN, heading));
    }

    out.push('\n');
    write_metadata(&mut out, &results.metadata, &palette);
    out
}

fn write_metadata(out: &mut String, metadata: &BookMetadata, palette: &Palette) {
    let fields = [
        ("Title", &metadata.title),
        ("Publisher", &metadata.publisher),
        ("Edition", &metadata.edition),
        ("Language", &metadata.language),
    ];
    for (header, value) in fields {
        write_aligned(out, header, &[or_dash(value.as_ref())], Some((palette, YELLOW)), 0);
    }
}

pub fn render_csv(results: &SearchResults, selection: Selection) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["condition", "price", "price_value", "date", "description", "url"])?;

    for condition in selection.conditions() {
        for offer in rank(offers_for(results, condition), selection.limit) {
            let value = offer.price_value.map(|v| v.to_string()).unwrap_or_default();
            let description = offer.description.join(" | ");
            writer.write_record([
                condition.as_str(),
                offer.price.as_deref().unwrap_or_default(),
                value.as_str(),
                offer.date.as_deref().unwrap_or_default(),
                description.as_str(),
                offer.url.as_deref().unwrap_or_default(),
            ])?;
        }
    }

    Ok(String::from_utf8(writer.into_inner()?)?)
}
