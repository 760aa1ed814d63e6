//! Raw and normalized record types.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Rank group assigned to values that do not parse as integers.
///
/// High enough to fall outside any retry window.
pub const RANK_GROUP_SENTINEL: u32 = 100;

/// Column names understood by the normalizer.
pub mod columns {
    pub const TYPE: &str = "type";
    pub const URL: &str = "url";
    pub const SUBURB: &str = "suburb";
    pub const SERVICE: &str = "service";
    pub const RANK_ABSOLUTE: &str = "rank_absolute";
    pub const RANK_GROUP: &str = "rank_group";
    pub const DOMAIN: &str = "domain";
}

/// A row exactly as read from an input file, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<(String, String)>,
}

impl RawRow {
    /// Create a row from `(header, value)` pairs.
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// Value of the first column named `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`RawRow::get`] but treats an empty cell as missing.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (key, value) in &self.columns {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Canonical shape of one search-result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Result type, lowercased with spaces replaced by underscores.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Result URL; empty when the listing has no landing page.
    pub url: String,
    pub suburb: String,
    pub service: String,
    /// Absolute rank as it appeared in the input (not necessarily numeric).
    pub rank_absolute: String,
    /// Rank within the result group as it appeared in the input.
    pub rank_group: String,
    pub domain: String,
}

impl NormalizedRecord {
    /// Normalize a raw input row, applying the documented defaults.
    pub fn from_row(row: &RawRow) -> Self {
        Self {
            record_type: sanitize_type(row.get(columns::TYPE).unwrap_or("other")),
            url: row.get_non_empty(columns::URL).unwrap_or_default().to_string(),
            suburb: row
                .get_non_empty(columns::SUBURB)
                .or_else(|| row.get_non_empty("Suburb"))
                .unwrap_or("Unknown")
                .to_string(),
            service: row
                .get_non_empty(columns::SERVICE)
                .or_else(|| row.get_non_empty("Service"))
                .unwrap_or("service")
                .to_string(),
            rank_absolute: row.get(columns::RANK_ABSOLUTE).unwrap_or("0").to_string(),
            rank_group: row.get(columns::RANK_GROUP).unwrap_or("0").to_string(),
            domain: row
                .get_non_empty(columns::DOMAIN)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Numeric absolute rank; non-numeric values count as 0.
    pub fn rank_absolute_value(&self) -> u32 {
        parse_rank_absolute(&self.rank_absolute)
    }

    /// Numeric rank group; non-numeric values map to [`RANK_GROUP_SENTINEL`].
    pub fn rank_group_value(&self) -> u32 {
        parse_rank_group(&self.rank_group)
    }
}

/// Lowercase a result type and replace spaces with underscores.
pub fn sanitize_type(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Parse an absolute rank. Anything but plain digits yields 0.
pub fn parse_rank_absolute(value: &str) -> u32 {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Parse a rank group. Anything that is not an integer yields the sentinel.
pub fn parse_rank_group(value: &str) -> u32 {
    value.trim().parse().unwrap_or(RANK_GROUP_SENTINEL)
}
