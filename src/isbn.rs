//! SBN / ISBN-10 / ISBN-13 checks for the search keyword.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IsbnError {
    #[error("not a valid SBN, ISBN-10 or ISBN-13 number: expected 9, 10 or 13 digits, got {0}")]
    Length(usize),
    #[error("not a valid SBN, ISBN-10 or ISBN-13 number: bad check digit in {0}")]
    Checksum(String),
}

/// Keeps only the ASCII digits, so `978-0-441-47812-5` and
/// `978 0441478125` read the same.
pub fn sanitise(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Returns the number to search for. SBNs are widened to ISBN-10.
pub fn validate(input: &str) -> Result<String, IsbnError> {
    let digits = sanitise(input);
    let isbn = match digits.len() {
        9 => format!("0{digits}"),
        10 | 13 => digits,
        n => return Err(IsbnError::Length(n)),
    };
    let valid = match isbn.len() {
        10 => isbn10_ok(&isbn),
        _ => isbn13_ok(&isbn),
    };
    if valid {
        Ok(isbn)
    } else {
        Err(IsbnError::Checksum(isbn))
    }
}

fn digit_values(isbn: &str) -> impl Iterator<Item = u32> + '_ {
    isbn.bytes().map(|b| u32::from(b - b'0'))
}

// Sum of running sums; equivalent to the weighted 10..1 sum mod 11.
fn isbn10_ok(isbn: &str) -> bool {
    let (_, sum) = digit_values(isbn).fold((0, 0), |(running, sum), d| {
        let running = running + d;
        (running, sum + running)
    });
    sum % 11 == 0
}

fn isbn13_ok(isbn: &str) -> bool {
    let sum: u32 = digit_values(isbn)
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    sum % 10 == 0
}
