use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Canonical identifier of one schedulable item (a page/brief pair).
///
/// Numeric and textual spellings of the same id normalize to one value, so
/// `ItemId::from(42u64)`, `ItemId::from("42")` and `ItemId::from(" 042 ")`
/// are equal and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_item_id(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trims whitespace and re-renders unsigned integers in plain decimal form.
pub fn normalize_item_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(number) => number.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! item_id_from_integer {
    ($($int:ty),*) => {
        $(
            impl From<$int> for ItemId {
                fn from(value: $int) -> Self {
                    Self::new(value.to_string())
                }
            }
        )*
    };
}

item_id_from_integer!(u32, u64, usize, i32, i64);

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for ItemId {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<&ItemId> for ItemId {
    fn from(value: &ItemId) -> Self {
        value.clone()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawItemId::deserialize(deserializer)? {
            RawItemId::Number(number) => ItemId::from(number),
            RawItemId::Text(text) => ItemId::new(text),
        })
    }
}
