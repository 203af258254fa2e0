use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{BookMetadata, Offer, SearchResults};
use crate::report::{self, ReportError, Selection};

/// JSON snapshot of one search.
#[derive(Serialize)]
pub struct Archive<'a> {
    pub isbn: &'a str,
    pub currency: &'a str,
    pub fetched_at: String,
    pub metadata: &'a BookMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_offers: Option<Vec<&'a Offer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_offers: Option<Vec<&'a Offer>>,
}

impl<'a> Archive<'a> {
    pub fn new(isbn: &'a str, currency: &'a str, results: &'a SearchResults, selection: Selection) -> Self {
        Archive {
            isbn,
            currency,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            metadata: &results.metadata,
            new_offers: selection
                .new
                .then(|| report::rank(&results.new_offers, selection.limit)),
            used_offers: selection
                .used
                .then(|| report::rank(&results.used_offers, selection.limit)),
        }
    }
}

pub fn render_json(archive: &Archive<'_>) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(archive)?)
}

pub fn save_to_file(contents: &[u8], filename: &Path) -> Result<()> {
    let mut file = File::create(filename)
        .with_context(|| format!("unable to create {}", filename.display()))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;

    fn results() -> SearchResults {
        let offer = |price: &str| Offer {
            condition: Condition::Used,
            price: Some(price.to_string()),
            price_value: crate::parser::normalize_price(price),
            date: Some("1987".into()),
            url: None,
            description: vec!["Good".into()],
        };
        SearchResults {
            metadata: BookMetadata {
                title: Some("Hyperion".into()),
                ..BookMetadata::default()
            },
            new_offers: vec![],
            used_offers: vec![offer("$8.00"), offer("$4.50")],
        }
    }

    #[test]
    fn json_holds_selected_tables_only() {
        let results = results();
        let selection = Selection { new: false, used: true, limit: 1 };
        let archive = Archive::new("9780553283686", "USD", &results, selection);
        let json: serde_json::Value = serde_json::from_str(&render_json(&archive).unwrap()).unwrap();

        assert_eq!(json["isbn"], "9780553283686");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["metadata"]["title"], "Hyperion");
        assert!(json["metadata"]["publisher"].is_null());
        assert!(json.get("new_offers").is_none());
        let used = json["used_offers"].as_array().unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0]["price"], "$4.50");
        assert_eq!(used[0]["price_value"], "4.50");
        assert_eq!(used[0]["condition"], "used");
        assert!(chrono::DateTime::parse_from_rfc3339(json["fetched_at"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn saves_contents() {
        let path = std::env::temp_dir().join(format!("bookfind-archive-{}.json", std::process::id()));
        save_to_file(b"{}", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        std::fs::remove_file(&path).unwrap();
    }
}
