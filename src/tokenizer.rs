//! Flat HTML event stream.
//!
//! Wraps the `html5ever` tokenizer without its tree builder: the page is
//! reduced to tag-open, tag-close and text events in source order, which is
//! all the extraction state machine needs.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

/// One parse event. Attribute pairs keep source order; a repeated
/// attribute keeps its first value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Close {
        name: String,
    },
    Text(String),
}

#[cfg(test)]
impl Event {
    pub fn open(name: &str, attrs: &[(&str, &str)]) -> Self {
        Event::Open {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    pub fn close(name: &str) -> Self {
        Event::Close {
            name: name.to_string(),
        }
    }

    pub fn text(data: &str) -> Self {
        Event::Text(data.to_string())
    }
}

#[derive(Default)]
struct EventSink {
    events: Vec<Event>,
    pending_text: String,
}

impl EventSink {
    /// Character tokens arrive in arbitrary chunks; emit one text event per
    /// run between two non-text tokens.
    fn flush_text(&mut self) {
        if !self.pending_text.is_empty() {
            let text = std::mem::take(&mut self.pending_text);
            self.events.push(Event::Text(text));
        }
    }

    fn push_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        self.flush_text();
        let name = tag.name.to_string();
        match tag.kind {
            TagKind::StartTag => {
                let attrs = tag
                    .attrs
                    .into_iter()
                    .map(|a| (a.name.local.to_string(), a.value.to_string()))
                    .collect();
                let raw = match name.as_str() {
                    "script" => Some(RawKind::ScriptData),
                    "style" => Some(RawKind::Rawtext),
                    _ => None,
                };
                self.events.push(Event::Open { name, attrs });
                match raw {
                    Some(kind) => TokenSinkResult::RawData(kind),
                    None => TokenSinkResult::Continue,
                }
            }
            TagKind::EndTag => {
                self.events.push(Event::Close { name });
                TokenSinkResult::Continue
            }
        }
    }

    fn push_chars(&mut self, chars: &StrTendril) {
        self.pending_text.push_str(chars);
    }
}

impl TokenSink for EventSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => return self.push_tag(tag),
            Token::CharacterTokens(chars) => self.push_chars(&chars),
            Token::NullCharacterToken | Token::ParseError(_) => {}
            Token::CommentToken(_) | Token::DoctypeToken(_) | Token::EOFToken => self.flush_text(),
        }
        TokenSinkResult::Continue
    }
}

/// Tokenize a whole document into events.
pub fn tokenize(html: &str) -> Vec<Event> {
    let mut input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));

    let mut tokenizer = Tokenizer::new(EventSink::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();

    let mut sink = tokenizer.sink;
    sink.flush_text();
    sink.events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_open_text_close_in_order() {
        let events = tokenize(r#"<div class="a" id="b">hello</div>"#);
        assert_eq!(
            events,
            vec![
                Event::open("div", &[("class", "a"), ("id", "b")]),
                Event::text("hello"),
                Event::close("div"),
            ]
        );
    }

    #[test]
    fn repeated_attribute_keeps_first_value() {
        let events = tokenize(r#"<a href="/one" href="/two">x</a>"#);
        assert_eq!(events[0], Event::open("a", &[("href", "/one")]));
    }

    #[test]
    fn coalesces_text_around_entities() {
        let events = tokenize("<span>Fish &amp; Chips</span>");
        assert_eq!(events[1], Event::text("Fish & Chips"));
    }

    #[test]
    fn decodes_entities_in_attribute_values() {
        let events = tokenize(r#"<a href="/r?a=1&amp;bu=x">"#);
        assert_eq!(events[0], Event::open("a", &[("href", "/r?a=1&bu=x")]));
    }

    #[test]
    fn lowercases_tag_and_attribute_names() {
        let events = tokenize(r#"<DIV CLASS="Keep-Case"></DIV>"#);
        assert_eq!(events[0], Event::open("div", &[("class", "Keep-Case")]));
        assert_eq!(events[1], Event::close("div"));
    }

    #[test]
    fn script_body_is_text_not_tags() {
        let events = tokenize(r#"<script>var s = "<div class='item-note'>";</script><p>after</p>"#);
        assert_eq!(events[0], Event::open("script", &[]));
        assert_eq!(events[1], Event::text(r#"var s = "<div class='item-note'>";"#));
        assert_eq!(events[2], Event::close("script"));
        assert_eq!(events[3], Event::open("p", &[]));
    }

    #[test]
    fn comments_split_text_runs() {
        let events = tokenize("one<!-- ad -->two");
        assert_eq!(events, vec![Event::text("one"), Event::text("two")]);
    }

    #[test]
    fn self_closing_tags_only_open() {
        let events = tokenize("<br/>x");
        assert_eq!(events, vec![Event::open("br", &[]), Event::text("x")]);
    }
}
