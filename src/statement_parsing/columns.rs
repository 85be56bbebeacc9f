use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    Amount,
    Currency,
    Description,
    Category,
}

impl CanonicalField {
    /// Whether the field is kept in normalized rows. Category is recognized
    /// but not shown.
    pub fn is_wanted(self) -> bool {
        return !matches!(self, CanonicalField::Category);
    }
}

/// Lower-cased bank export header -> canonical field.
static COLUMN_MAP: Lazy<HashMap<&'static str, CanonicalField>> = Lazy::new(|| {
    HashMap::from([
        ("datum", CanonicalField::Date),
        ("uitvoeringsdatum", CanonicalField::Date),
        ("booking date", CanonicalField::Date),
        ("date", CanonicalField::Date),
        ("bedrag", CanonicalField::Amount),
        ("amount", CanonicalField::Amount),
        ("valuta rekening", CanonicalField::Currency),
        ("valuta", CanonicalField::Currency),
        ("currency", CanonicalField::Currency),
        ("mededeling", CanonicalField::Description),
        ("description", CanonicalField::Description),
        ("category", CanonicalField::Category),
    ])
});

pub fn canonical_field(header: &str) -> Option<CanonicalField> {
    let header = header
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_lowercase();

    return COLUMN_MAP.get(header.as_str()).copied();
}
