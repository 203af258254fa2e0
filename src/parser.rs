//! Search-result extraction.
//!
//! The results page is read as a flat stream of tag and text events. Which
//! field a piece of text belongs to is decided only by the markers on the
//! most recent tags, so ads and tracking markup in between are skipped
//! without building a document tree.

use std::str::FromStr;
use std::sync::LazyLock;

use rust_decimal::Decimal;
use tracing::{debug, trace};
use url::Url;

use crate::models::{BookMetadata, Condition, Offer, SearchResults};
use crate::tokenizer::{self, Event};

/// Relative redirect links are resolved against this before their query is read.
const SITE_BASE: &str = "https://www.bookfinder.com/";

/// Query parameter of the tracking link that carries the shop URL.
const REDIRECT_PARAM: &str = "bu";

/// Decorative void tags that must not disturb the capture state.
const IGNORED_TAGS: [&str; 2] = ["br", "link"];

#[allow(clippy::expect_used)]
static SITE_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(SITE_BASE).expect("valid base url"));

/// Page zones, entered in this order as section-boundary markers are seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    Preamble,
    New,
    Used,
    Trailer,
}

impl Section {
    fn next(self) -> Self {
        match self {
            Section::Preamble => Section::New,
            Section::New => Section::Used,
            Section::Used | Section::Trailer => Section::Trailer,
        }
    }

    fn condition(self) -> Option<Condition> {
        match self {
            Section::New => Some(Condition::New),
            Section::Used => Some(Condition::Used),
            Section::Preamble | Section::Trailer => None,
        }
    }
}

/// Field the next text event is stored into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Capture {
    #[default]
    None,
    Title,
    Description,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Publisher,
    Edition,
    Language,
}

impl MetadataField {
    /// The n-th metadata marker on the page (1-based) names the n-th field.
    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            1 => Some(MetadataField::Publisher),
            2 => Some(MetadataField::Edition),
            3 => Some(MetadataField::Language),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Title,
    MetadataField,
    SectionBoundary,
    OfferStart,
    Price,
    PubDate,
    Note,
}

#[derive(Debug, Clone, Copy)]
enum Expect {
    Value(&'static str),
    Present,
}

impl Expect {
    fn accepts(self, value: &str) -> bool {
        match self {
            Expect::Value(expected) => value == expected,
            Expect::Present => true,
        }
    }
}

/// Checked against every attribute of a non-anchor tag, in this order.
/// All matches apply.
const MARKERS: [(&str, Expect, Marker); 7] = [
    ("id", Expect::Value("describe-isbn-title"), Marker::Title),
    ("class", Expect::Value("describe-isbn"), Marker::MetadataField),
    ("class", Expect::Value("results-table-Logo"), Marker::SectionBoundary),
    ("data-price", Expect::Present, Marker::OfferStart),
    ("class", Expect::Value("results-price"), Marker::Price),
    ("data-pub_date", Expect::Present, Marker::PubDate),
    ("class", Expect::Value("item-note"), Marker::Note),
];

/// Offer under construction. Its condition is only known once it is
/// finalized, from the section the parser is in at that moment.
#[derive(Debug, Default)]
struct PendingOffer {
    price: Option<String>,
    price_value: Option<Decimal>,
    date: Option<String>,
    url: Option<String>,
    description: Vec<String>,
}

impl PendingOffer {
    fn into_offer(self, condition: Condition) -> Offer {
        Offer {
            condition,
            price: self.price,
            price_value: self.price_value,
            date: self.date,
            url: self.url,
            description: self.description,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParserState {
    section: Section,
    capture: Capture,
    metadata_field: Option<MetadataField>,
    metadata_markers: usize,
    in_progress: bool,
    pending: PendingOffer,
}

/// Single-use extraction state machine for one results page.
#[derive(Debug, Default)]
pub struct BookParser {
    state: ParserState,
    results: SearchResults,
}

impl BookParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Open { name, attrs } => self.start_tag(&name, &attrs),
            Event::Close { name } => self.end_tag(&name),
            Event::Text(data) => self.text(&data),
        }
    }

    pub fn start_tag(&mut self, name: &str, attrs: &[(String, String)]) {
        if IGNORED_TAGS.contains(&name) {
            return;
        }
        if name == "a" {
            self.anchor(attrs);
            return;
        }

        self.state.capture = Capture::None;
        for (attr, value) in attrs {
            for (marker_attr, expect, marker) in MARKERS {
                if attr == marker_attr && expect.accepts(value) {
                    self.apply(marker, value);
                }
            }
        }
    }

    /// Closing tags carry no markers on this page.
    pub fn end_tag(&mut self, _name: &str) {}

    pub fn text(&mut self, data: &str) {
        let data = data.trim();
        if data.is_empty() {
            return;
        }

        let state = &mut self.state;
        let metadata = &mut self.results.metadata;
        match state.capture {
            Capture::Title => metadata.title = Some(data.to_string()),
            Capture::Description => state.pending.description.push(data.to_string()),
            Capture::Price => {
                state.pending.price = Some(data.to_string());
                state.pending.price_value = normalize_price(data);
            }
            Capture::None => match state.metadata_field {
                Some(MetadataField::Publisher) => metadata.publisher = Some(data.to_string()),
                Some(MetadataField::Edition) => metadata.edition = Some(data.to_string()),
                Some(MetadataField::Language) => metadata.language = Some(data.to_string()),
                None => {}
            },
        }
        // A metadata marker owns exactly one text event, even one taken by
        // an active data capture.
        state.metadata_field = None;
    }

    pub fn metadata(&self) -> &BookMetadata {
        &self.results.metadata
    }

    pub fn new_offers(&self) -> &[Offer] {
        &self.results.new_offers
    }

    pub fn used_offers(&self) -> &[Offer] {
        &self.results.used_offers
    }

    /// Hands out the finalized records. An offer still being built is
    /// dropped: only a following price marker finalizes it.
    pub fn finish(self) -> SearchResults {
        if self.state.in_progress {
            trace!("unterminated offer at end of page dropped");
        }
        self.results
    }

    fn anchor(&mut self, attrs: &[(String, String)]) {
        match self.state.capture {
            Capture::Price => {
                if self.state.pending.url.is_some() {
                    return;
                }
                self.state.pending.url = attrs
                    .iter()
                    .filter(|(name, _)| name == "href")
                    .find_map(|(_, href)| extract_redirect(href));
            }
            // links inside item notes are affiliate banners, not description
            Capture::Description => self.state.capture = Capture::None,
            Capture::None | Capture::Title => {}
        }
    }

    fn apply(&mut self, marker: Marker, value: &str) {
        let state = &mut self.state;
        match marker {
            Marker::Title => state.capture = Capture::Title,
            Marker::MetadataField => {
                state.metadata_markers += 1;
                state.metadata_field = MetadataField::from_ordinal(state.metadata_markers);
            }
            Marker::SectionBoundary => {
                state.section = state.section.next();
                debug!(section = ?state.section, "entered section");
            }
            Marker::OfferStart => self.start_offer(),
            Marker::Price => state.capture = Capture::Price,
            Marker::PubDate => state.pending.date = Some(value.to_string()),
            Marker::Note => state.capture = Capture::Description,
        }
    }

    fn start_offer(&mut self) {
        let state = &mut self.state;
        let finished = std::mem::take(&mut state.pending);
        if state.in_progress {
            match state.section.condition() {
                Some(condition) => {
                    let offer = finished.into_offer(condition);
                    trace!(?condition, price = ?offer.price, "offer finalized");
                    match condition {
                        Condition::New => self.results.new_offers.push(offer),
                        Condition::Used => self.results.used_offers.push(offer),
                    }
                }
                None => debug!(section = ?state.section, "offer outside result tables discarded"),
            }
        }
        state.in_progress = true;
    }
}

/// Tokenizes and extracts a whole results page.
pub fn parse_document(html: &str) -> SearchResults {
    let mut parser = BookParser::new();
    parser.feed(tokenizer::tokenize(html));
    parser.finish()
}

/// Reduces a display price to its digits and first decimal point.
///
/// Currency symbols, spaces and thousands separators are dropped, so
/// `"1,234.56 €"` becomes `1234.56`. Returns `None` when no digit is left.
pub fn normalize_price(display: &str) -> Option<Decimal> {
    let mut seen_point = false;
    let cleaned: String = display
        .chars()
        .filter(|c| match c {
            '0'..='9' => true,
            '.' if !seen_point => {
                seen_point = true;
                true
            }
            _ => false,
        })
        .collect();

    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let cleaned = cleaned.strip_suffix('.').unwrap_or(&cleaned);
    let cleaned = if cleaned.starts_with('.') {
        format!("0{cleaned}")
    } else {
        cleaned.to_string()
    };
    Decimal::from_str(&cleaned).ok()
}

/// Pulls the shop URL out of a tracking link.
pub fn extract_redirect(href: &str) -> Option<String> {
    let link = match SITE_BASE_URL.join(href.trim()) {
        Ok(link) => link,
        Err(err) => {
            debug!(href, %err, "unparseable redirect link");
            return None;
        }
    };
    let target = link
        .query_pairs()
        .find(|(name, value)| name == REDIRECT_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned());
    if target.is_none() {
        debug!(href, "redirect link without target parameter");
    }
    target
}
