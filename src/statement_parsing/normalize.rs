use serde::Serialize;
use utoipa::ToSchema;

use super::columns::{CanonicalField, canonical_field};

pub const DELIMITER: u8 = b';';

/// One statement line with only the canonical columns the source file had.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NormalizedRow {
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "Amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(rename = "Currency", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NormalizedRow {
    fn set(&mut self, field: CanonicalField, value: &str) {
        let slot = match field {
            CanonicalField::Date => &mut self.date,
            CanonicalField::Amount => &mut self.amount,
            CanonicalField::Currency => &mut self.currency,
            CanonicalField::Description => &mut self.description,
            CanonicalField::Category => return,
        };

        *slot = Some(value.to_owned());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("error reading csv header row")]
    Header(#[source] csv::Error),

    #[error("error reading csv record")]
    Record(#[source] csv::Error),

    #[error("quoted field opened on line {line} is never closed")]
    UnclosedQuote { line: usize },

    #[error("unexpected quote on line {line}")]
    StrayQuote { line: usize },
}

/// Checks that quotes only open at the start of a field and that every quoted
/// field is closed right before a delimiter or line end. The csv reader keeps
/// such quotes as data instead of failing.
fn check_quotes(text: &str) -> Result<(), ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = char::from(DELIMITER);

    let mut chars = text.chars().peekable();
    let mut line = 1;
    let mut field_start = true;
    let mut quote_opened_on = None;

    while let Some(c) = chars.next() {
        if quote_opened_on.is_some() {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                }
                '"' => {
                    quote_opened_on = None;
                    match chars.peek() {
                        None | Some('\n') | Some('\r') => {}
                        Some(next) if *next == delimiter => {}
                        Some(_) => return Err(ParseError::StrayQuote { line }),
                    }
                }
                '\n' => line += 1,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if field_start => {
                quote_opened_on = Some(line);
                field_start = false;
            }
            '"' => return Err(ParseError::StrayQuote { line }),
            '\n' => {
                line += 1;
                field_start = true;
            }
            '\r' => field_start = true,
            c if c == delimiter => field_start = true,
            _ => field_start = false,
        }
    }

    if let Some(line) = quote_opened_on {
        return Err(ParseError::UnclosedQuote { line });
    }

    return Ok(());
}

/// Parses a `;` separated statement export and renames its columns to the
/// canonical schema. Columns without a mapping are dropped. When several
/// columns map to the same field the right-most one wins.
pub fn normalize_csv(data: &[u8]) -> Result<Vec<NormalizedRow>, ParseError> {
    let text = String::from_utf8_lossy(data);
    check_quotes(&text)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(DELIMITER)
        .from_reader(text.as_bytes());

    let fields = reader
        .headers()
        .map_err(ParseError::Header)?
        .iter()
        .map(|header| canonical_field(header).filter(|field| field.is_wanted()))
        .collect::<Vec<_>>();

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(ParseError::Record)?;

        let mut row = NormalizedRow::default();
        for (field, value) in fields.iter().zip(record.iter()) {
            if let Some(field) = field {
                row.set(*field, value);
            }
        }

        rows.push(row);
    }

    return Ok(rows);
}
