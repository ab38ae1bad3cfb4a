//! Secondary index values
//!
//! The store keeps integer and binary indexes apart, keyed by a suffix on the
//! index name (`age_int`, `color_bin`). The suffix is chosen from the value's
//! type, so writes and lookups built from the same value agree on the index.

use std::fmt;

/// A value stored in, or looked up from, a secondary index
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexValue {
    /// Integer index entry (`_int`)
    Int(i64),
    /// Opaque string index entry (`_bin`)
    Bin(String),
}

impl IndexValue {
    /// Index name suffix for this value
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bin(_) => "bin",
        }
    }

    /// Full index name as the store knows it
    pub fn index_name(&self, name: &str) -> String {
        format!("{}_{}", name, self.suffix())
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bin(v) => f.write_str(v),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for IndexValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for IndexValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<String> for IndexValue {
    fn from(v: String) -> Self {
        Self::Bin(v)
    }
}

impl From<&str> for IndexValue {
    fn from(v: &str) -> Self {
        Self::Bin(v.to_string())
    }
}

/// Index name suffix for any value convertible to an index value
pub fn suffix(value: impl Into<IndexValue>) -> &'static str {
    value.into().suffix()
}
