use std::time::Duration;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://bookfinder.com/search/";

const MAX_REDIRECTS: usize = 10;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid search url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unable to fetch entry: {0}")]
    Http(#[from] reqwest::Error),
    #[error("page is neither valid {0} nor valid UTF-8")]
    Encoding(&'static str),
}

/// Raw response body plus the charset the server declared, if any.
pub struct Page {
    pub body: Vec<u8>,
    pub charset: Option<String>,
}

/// Query URL for one ISBN in one currency.
pub fn search_url(base: &str, isbn: &str, currency: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("keywords", isbn)
        .append_pair("currency", currency)
        .append_pair("lang", "en")
        .append_pair("st", "sh")
        .append_pair("ac", "qr")
        .append_pair("submit", "");
    Ok(url)
}

pub fn fetch_page(url: &Url, timeout: Duration) -> Result<Page, FetchError> {
    let redirect_policy = redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    });

    let client = Client::builder()
        .redirect(redirect_policy)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;

    info!(%url, "fetching search results");
    let resp = client.get(url.as_str()).send()?.error_for_status()?;
    let charset = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_param);
    let body = resp.bytes()?.to_vec();
    debug!(bytes = body.len(), ?charset, "page received");

    Ok(Page { body, charset })
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// Decodes the body strictly with the declared charset (windows-1252 when
/// none is declared or the label is unknown), then strictly as UTF-8.
pub fn decode_page(page: &Page) -> Result<String, FetchError> {
    let primary = page
        .charset
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(WINDOWS_1252);

    if let Some(text) = primary.decode_without_bom_handling_and_without_replacement(&page.body) {
        return Ok(text.into_owned());
    }
    debug!(encoding = primary.name(), "falling back to UTF-8");
    UTF_8
        .decode_without_bom_handling_and_without_replacement(&page.body)
        .map(|text| text.into_owned())
        .ok_or(FetchError::Encoding(primary.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &[u8], charset: Option<&str>) -> Page {
        Page {
            body: body.to_vec(),
            charset: charset.map(str::to_string),
        }
    }

    #[test]
    fn builds_search_query() {
        let url = search_url(DEFAULT_BASE_URL, "9780441478125", "EUR").unwrap();
        assert_eq!(
            url.as_str(),
            "https://bookfinder.com/search/?keywords=9780441478125&currency=EUR&lang=en&st=sh&ac=qr&submit="
        );
    }

    #[test]
    fn encodes_query_values() {
        let url = search_url(DEFAULT_BASE_URL, "97804 41&x", "E R").unwrap();
        assert!(url.as_str().contains("keywords=97804+41%26x&currency=E+R"));
    }

    #[test]
    fn rejects_bad_base() {
        assert!(matches!(
            search_url("not a url", "1", "EUR"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn reads_charset_from_content_type() {
        assert_eq!(
            charset_param("text/html; charset=\"UTF-8\""),
            Some("UTF-8".to_string())
        );
        assert_eq!(
            charset_param("text/html;Charset=windows-1252"),
            Some("windows-1252".to_string())
        );
        assert_eq!(charset_param("text/html"), None);
    }

    #[test]
    fn defaults_to_windows_1252() {
        let text = decode_page(&page(b"\x80 12.50", None)).unwrap();
        assert_eq!(text, "€ 12.50");
    }

    #[test]
    fn honours_declared_charset() {
        let text = decode_page(&page("€ 12.50".as_bytes(), Some("utf-8"))).unwrap();
        assert_eq!(text, "€ 12.50");
    }

    #[test]
    fn falls_back_to_utf8() {
        let text = decode_page(&page("Café".as_bytes(), Some("ascii-only-nonsense"))).unwrap();
        // unknown label decodes as windows-1252, which accepts every byte here
        assert_eq!(text, "CafÃ©");

        // 7-bit encoding: the UTF-8 bytes of "é" are malformed
        let text = decode_page(&page("Café".as_bytes(), Some("iso-2022-jp"))).unwrap();
        assert_eq!(text, "Café");
    }

    #[test]
    fn fails_when_no_encoding_fits() {
        let err = decode_page(&page(b"\xff\xfe\xfd", Some("utf-8"))).unwrap_err();
        assert!(matches!(err, FetchError::Encoding("UTF-8")));
    }
}
