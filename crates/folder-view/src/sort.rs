//! Ordering policy for folder listings
//!
//! Folders always come first. Within each partition entries are ordered by the
//! selected column, with the name comparator and then plain ordinal comparison
//! as tie-breakers so the result never depends on enumeration order.

use crate::entry::ListEntry;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// Three-way comparison of display names
pub trait NameComparator: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Natural, case-insensitive name order.
///
/// Digit runs compare by magnitude ("file2" < "file10"). Names are transliterated
/// to ASCII with `deunicode` for the primary comparison so accented and
/// non-Latin names land near their Latin reading instead of after every ASCII
/// name. Ties fall back to the case-folded original, then to ordinal order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalComparator;

impl NameComparator for NaturalComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        natural_cmp(&fold(a), &fold(b))
            .then_with(|| natural_cmp(&a.to_lowercase(), &b.to_lowercase()))
            .then_with(|| a.cmp(b))
    }
}

fn fold(name: &str) -> String {
    deunicode::deunicode(name).to_lowercase()
}

/// Consume a run of ASCII digits, leading zeros dropped
fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        if !(digits.is_empty() && c == '0') {
            digits.push(c);
        }
    }
    digits
}

/// Walks both names a character at a time. Where both sides are at a digit
/// the whole runs compare by magnitude; everything else compares by code point,
/// so "photo.jpg" precedes "photo1.jpg".
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let x = take_digits(&mut left);
                let y = take_digits(&mut right);
                let by_value = x.len().cmp(&y.len()).then_with(|| x.cmp(&y));
                if by_value != Ordering::Equal {
                    return by_value;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    #[default]
    Name,
    Modified,
    Size,
}

impl FromStr for SortColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortColumn::Name),
            "modified" | "date" => Ok(SortColumn::Modified),
            "size" => Ok(SortColumn::Size),
            _ => bail!("Invalid sort column: {}", s),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortColumn::Name => write!(f, "name"),
            SortColumn::Modified => write!(f, "modified"),
            SortColumn::Size => write!(f, "size"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOrder {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    /// Clicking the current column flips direction; another column starts ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.direction = match self.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
        } else {
            *self = SortOrder::new(column, SortDirection::Ascending);
        }
    }
}

pub fn compare_entries(
    a: &ListEntry,
    b: &ListEntry,
    order: SortOrder,
    comparator: &dyn NameComparator,
) -> Ordering {
    let a_name = a.display_name();
    let b_name = b.display_name();

    let by_column = match order.column {
        SortColumn::Name => comparator.compare(&a_name, &b_name),
        SortColumn::Modified => a.item().modified.cmp(&b.item().modified),
        SortColumn::Size => a.item().size_bytes.cmp(&b.item().size_bytes),
    };
    let by_column = match order.direction {
        SortDirection::Ascending => by_column,
        SortDirection::Descending => by_column.reverse(),
    };

    b.is_folder()
        .cmp(&a.is_folder())
        .then(by_column)
        .then_with(|| comparator.compare(&a_name, &b_name))
        .then_with(|| a.path().cmp(b.path()))
}

/// Full re-sort; never incremental.
pub fn sort_entries(entries: &mut [ListEntry], order: SortOrder, comparator: &dyn NameComparator) {
    entries.sort_by(|a, b| compare_entries(a, b, order, comparator));
}
