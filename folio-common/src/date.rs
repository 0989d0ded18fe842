//! Display formatting for publication timestamps.
//!
//! Patterns use the CLDR field letters most content tooling speaks (`dd MMM yyyy`,
//! `d 'de' MMMM 'de' yyyy`) and are compiled once into chrono format items. Month and
//! weekday names are taken from the configured locale.

use chrono::{
    DateTime, FixedOffset, Locale,
    format::{Fixed, Item, Numeric, Pad},
};
use std::str::FromStr;
use thiserror::Error;

/// Offset form used by Prismic, which omits the colon (`+0000`).
const OFFSET_WITHOUT_COLON: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum DateError {
    #[error("Timestamp {raw:?} could not be parsed: {source}")]
    InvalidDate {
        raw: String,
        source: chrono::ParseError,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum DateFormatError {
    #[error("Unknown locale: {0}")]
    UnknownLocale(String),
    #[error(transparent)]
    Pattern(#[from] DatePatternError),
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum DatePatternError {
    #[error("Unsupported pattern field: {0}")]
    UnsupportedField(String),
    #[error("Unterminated quoted literal in pattern")]
    UnterminatedLiteral,
}

/// A compiled date pattern.
#[derive(Clone, PartialEq, Debug)]
pub struct DatePattern {
    items: Vec<Item<'static>>,
}

impl FromStr for DatePattern {
    type Err = DatePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = Vec::new();
        let mut literal = String::new();
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    literal.push('\'');
                    continue;
                }

                loop {
                    match chars.next() {
                        None => return Err(DatePatternError::UnterminatedLiteral),
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            literal.push('\'');
                        }
                        Some('\'') => break,
                        Some(other) => literal.push(other),
                    }
                }
            } else if c.is_ascii_alphabetic() {
                let mut width = 1;
                while chars.peek() == Some(&c) {
                    chars.next();
                    width += 1;
                }

                if !literal.is_empty() {
                    items.push(Item::OwnedLiteral(std::mem::take(&mut literal).into()));
                }
                items.push(field_item(c, width)?);
            } else {
                literal.push(c);
            }
        }

        if !literal.is_empty() {
            items.push(Item::OwnedLiteral(literal.into()));
        }

        Ok(Self { items })
    }
}

fn field_item(letter: char, width: usize) -> Result<Item<'static>, DatePatternError> {
    let pad = |width: usize| if width >= 2 { Pad::Zero } else { Pad::None };

    let item = match (letter, width) {
        ('d', 1..=2) => Item::Numeric(Numeric::Day, pad(width)),
        ('M', 1..=2) => Item::Numeric(Numeric::Month, pad(width)),
        ('M', 3) => Item::Fixed(Fixed::ShortMonthName),
        ('M', 4) => Item::Fixed(Fixed::LongMonthName),
        ('y', 2) => Item::Numeric(Numeric::YearMod100, Pad::Zero),
        ('y', 1) => Item::Numeric(Numeric::Year, Pad::None),
        ('y', 3..=4) => Item::Numeric(Numeric::Year, Pad::Zero),
        ('E', 1..=3) => Item::Fixed(Fixed::ShortWeekdayName),
        ('E', 4) => Item::Fixed(Fixed::LongWeekdayName),
        ('H', 1..=2) => Item::Numeric(Numeric::Hour, pad(width)),
        ('m', 1..=2) => Item::Numeric(Numeric::Minute, pad(width)),
        _ => {
            return Err(DatePatternError::UnsupportedField(
                std::iter::repeat_n(letter, width).collect(),
            ));
        }
    };

    Ok(item)
}

/// Pattern plus locale, the two configuration inputs of date display.
#[derive(Clone, PartialEq, Debug)]
pub struct DateFormat {
    pub pattern: DatePattern,
    pub locale: Locale,
}

impl DateFormat {
    /// Builds a format from a CLDR pattern and a POSIX-style locale name (`pt_BR`, `pt-BR`).
    pub fn new(pattern: &str, locale: &str) -> Result<Self, DateFormatError> {
        let pattern = pattern.parse()?;
        let locale = Locale::try_from(locale.replace('-', "_").as_str())
            .map_err(|_| DateFormatError::UnknownLocale(locale.to_owned()))?;

        Ok(Self { pattern, locale })
    }

    #[must_use]
    pub fn format(&self, timestamp: &DateTime<FixedOffset>) -> String {
        timestamp
            .format_localized_with_items(self.pattern.items.iter(), self.locale)
            .to_string()
    }
}

/// Parses a content source timestamp, keeping its original offset.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, OFFSET_WITHOUT_COLON))
        .map_err(|source| DateError::InvalidDate {
            raw: raw.to_owned(),
            source,
        })
}

/// Formats a raw timestamp for display.
///
/// A missing or blank timestamp yields an empty string. The date is rendered in the
/// timestamp's own offset, not the local one.
pub fn normalize(raw: Option<&str>, format: &DateFormat) -> Result<String, DateError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(String::new()),
        Some(raw) => Ok(format.format(&parse_timestamp(raw)?)),
    }
}
