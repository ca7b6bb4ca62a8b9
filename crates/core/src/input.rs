//! Query list parsing.
//!
//! One query per line. Blank lines and `#` comments are skipped. Accepted
//! shapes:
//!
//! ```text
//! https://www.monotaro.com/p/1234/5678/
//! https://www.monotaro.com/p/1234/5678/ 4
//! https://www.monotaro.com/p/1234/5678/,4
//! https://www.amazon.co.jp/dp/B01N0QO5FT?th=1 , 4
//! https://www.monotaro.com/p/1234/5678/ | 個数: 4
//! ```
//!
//! A missing quantity means 1.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use crate::record::ProductQuery;
use crate::{ChumonError, Result};

/// `<url> | 個数: <n>`, the list-row format of the desktop form.
static LIST_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\|\s*個数\s*[:：]\s*(\S+)$").expect("valid list row regex"));

/// Parses one line. `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// Returns [`ChumonError::InvalidQuery`] when the quantity is not a positive
/// integer.
pub fn parse_line(line: &str) -> Result<Option<ProductQuery>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (url, quantity) = if let Some(caps) = LIST_ROW_RE.captures(line) {
        (caps.get(1).map_or("", |m| m.as_str()).trim(), Some(caps.get(2).map_or("", |m| m.as_str()).trim()))
    } else if let Some((url, quantity)) = line
        .rsplit_once(',')
        .filter(|(head, tail)| is_quantity_comma(head, tail))
    {
        (url.trim(), Some(quantity.trim()))
    } else if let Some((url, quantity)) = line.split_once(char::is_whitespace) {
        (url.trim(), Some(quantity.trim()))
    } else {
        (line, None)
    };

    let quantity = match quantity {
        None => 1,
        Some(raw) => parse_quantity(raw)?,
    };
    ProductQuery::new(url, quantity).map(Some)
}

/// A comma separates the quantity only when a number follows it. Inside a
/// query string it must also be spaced, so `?th=1,2` stays part of the URL.
fn is_quantity_comma(head: &str, tail: &str) -> bool {
    let spaced = head.ends_with(char::is_whitespace) || tail.starts_with(char::is_whitespace);
    is_digits(tail.trim()) && (spaced || !head.contains('?'))
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit() || ('０'..='９').contains(&c))
}

fn parse_quantity(raw: &str) -> Result<u32> {
    let normalized: String = raw
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect();
    normalized
        .parse::<u32>()
        .map_err(|_| ChumonError::InvalidQuery(format!("quantity {raw:?} is not a positive integer")))
}

/// Parses a whole list, naming the line number on the first bad line.
pub fn parse_queries(content: &str) -> Result<Vec<ProductQuery>> {
    let mut queries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(query)) => queries.push(query),
            Ok(None) => {}
            Err(e) => return Err(ChumonError::InvalidQuery(format!("line {}: {}", index + 1, e))),
        }
    }
    Ok(queries)
}

/// Reads and parses a list from any buffered reader.
pub fn read_queries<R: BufRead>(reader: R) -> Result<Vec<ProductQuery>> {
    let mut content = String::new();
    for line in reader.lines() {
        content.push_str(&line?);
        content.push('\n');
    }
    parse_queries(&content)
}
