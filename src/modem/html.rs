//! Row extraction from the modem's status pages.
//!
//! The device serves invalid markup. The heading row of each channel table
//! closes its `<tr>` twice:
//!
//! ```text
//! <tr><th colspan=8><strong>Downstream Bonded Channels</strong></th></tr>
//!    <td><strong>Channel ID</strong></td>
//!    ...
//! </tr>
//! ```
//!
//! html5ever recovers the stray `<td>`s into a row of their own, so column
//! headers can't be trusted. Rows are returned positionally and the caller
//! decides what each position means.

use crate::error::ParseError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Ordered rows of one table section.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub section: String,
    pub rows: Vec<Vec<String>>,
}

/// Value and comment of one key/value/comment row.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub value: String,
    pub comment: String,
}

fn selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::invalid_selector(selector, e))
}

fn collapsed_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_element(element: &ElementRef, name: &str) -> bool {
    element.value().name() == name
}

fn nearest_table<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| is_element(e, "table"))
}

/// True iff the page title is exactly `Login`.
///
/// The device answers an expired or missing session with HTTP 200 and this
/// page instead of an error status.
pub fn is_login_page(document: &Html) -> bool {
    let Ok(title) = selector("title") else {
        return false;
    };
    document
        .select(&title)
        .next()
        .map(|t| t.text().collect::<String>().trim() == "Login")
        .unwrap_or(false)
}

/// Finds the table whose `<th>` or `<caption>` reads `section`.
fn find_section_table<'a>(document: &'a Html, section: &str) -> Result<ElementRef<'a>, ParseError> {
    let headings = selector("th, caption")?;
    document
        .select(&headings)
        .filter(|h| collapsed_text(h) == section)
        .find_map(|h| nearest_table(&h))
        .ok_or_else(|| ParseError::section_not_found(section))
}

/// The table's own rows, each as its direct `<td>` children.
fn table_rows<'a>(table: &ElementRef<'a>) -> Result<Vec<Vec<ElementRef<'a>>>, ParseError> {
    let tr = selector("tr")?;
    Ok(table
        .select(&tr)
        .filter(|row| nearest_table(row).as_ref() == Some(table))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| is_element(cell, "td"))
                .collect()
        })
        .collect())
}

fn is_heading_row(cells: &[ElementRef], strong: &Selector) -> bool {
    !cells.is_empty() && cells.iter().all(|c| c.select(strong).next().is_some())
}

/// Extracts the data rows of the table titled `section`.
///
/// The first row (the title row) is always skipped, as are rows made only of
/// `<strong>` labels and rows without cells.
pub fn extract_rows(document: &Html, section: &str) -> Result<RawTable, ParseError> {
    let table = find_section_table(document, section)?;
    let strong = selector("strong")?;

    let rows: Vec<Vec<String>> = table_rows(&table)?
        .into_iter()
        .skip(1)
        .filter(|cells| !cells.is_empty() && !is_heading_row(cells, &strong))
        .map(|cells| cells.iter().map(collapsed_text).collect())
        .collect();

    tracing::debug!(section, count = rows.len(), "Extracted table rows");
    Ok(RawTable {
        section: section.to_string(),
        rows,
    })
}

/// Extracts `(key, value, comment)` rows of the table titled `section`.
///
/// Only rows of exactly three cells whose key is in `keys` are kept. Missing
/// keys are simply absent from the result.
pub fn extract_key_value_section(
    document: &Html,
    section: &str,
    keys: &[&str],
) -> Result<HashMap<String, StateRow>, ParseError> {
    let table = find_section_table(document, section)?;

    let mut result = HashMap::new();
    for cells in table_rows(&table)? {
        let [key, value, comment] = cells.as_slice() else {
            continue;
        };
        let key = collapsed_text(key);
        if !keys.contains(&key.as_str()) {
            continue;
        }
        result.insert(
            key,
            StateRow {
                value: collapsed_text(value),
                comment: collapsed_text(comment),
            },
        );
    }
    Ok(result)
}

/// For each label, finds the `<td>` reading exactly that label and returns
/// the text of the `<td>` that follows it.
pub fn extract_labelled_values(
    document: &Html,
    labels: &[&str],
) -> Result<HashMap<String, String>, ParseError> {
    let td = selector("td")?;

    let mut result = HashMap::new();
    for label in labels {
        let value = document
            .select(&td)
            .find(|cell| collapsed_text(cell) == *label)
            .and_then(|cell| {
                cell.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sibling| is_element(sibling, "td"))
            })
            .map(|sibling| collapsed_text(&sibling));
        if let Some(value) = value {
            result.insert(label.to_string(), value);
        }
    }
    Ok(result)
}

/// Text of the device clock line, without its `Current System Time:` label.
pub fn extract_system_time_text(document: &Html) -> Option<String> {
    let systime = selector("p#systime").ok()?;
    let text = document.select(&systime).next()?.text().collect::<String>();
    let (_, time) = text.split_once(':')?;
    Some(time.trim().to_string())
}
