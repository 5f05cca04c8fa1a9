//! Table schemas: which CSV column feeds which logical field.
//!
//! The same reference dataset has been exported with drifting layouts
//! (named headers in one revision, positional columns in another). Rather
//! than one loader per revision, a [`TableSchema`] maps logical field
//! names to columns by header name or by zero-based position, and the
//! generic reader does the rest.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{LoadError, tables};

/// A column reference: header name or zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Keeps only rows whose `column` equals one of `equals` (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowFilter {
    pub column: ColumnRef,
    pub equals: Vec<String>,
}

/// Layout of one reference table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSchema {
    /// Table name (e.g. `"forest_hazard_classes"`).
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Field delimiter. Exports from the GIS are semicolon-separated.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Lines starting with this character are skipped (rp5 preambles).
    #[serde(default)]
    pub comment: Option<char>,
    /// Whether the first line is a header row.
    #[serde(default = "default_true")]
    pub has_headers: bool,
    /// Logical field name -> column.
    pub columns: BTreeMap<String, ColumnRef>,
    /// Optional row filter applied before any field is read.
    #[serde(default)]
    pub filter: Option<RowFilter>,
}

const fn default_delimiter() -> char {
    ';'
}

const fn default_true() -> bool {
    true
}

impl TableSchema {
    /// Parses a schema from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Schema`] if the TOML is malformed.
    pub fn from_toml(name: &str, text: &str) -> Result<Self, LoadError> {
        toml::from_str(text).map_err(|source| LoadError::Schema {
            name: name.to_string(),
            source,
        })
    }

    /// Ensures every field in `required` is mapped.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::SchemaField`] naming the first unmapped field.
    pub fn require(&self, required: &[&'static str]) -> Result<(), LoadError> {
        match required.iter().find(|field| !self.columns.contains_key(**field)) {
            Some(field) => Err(LoadError::SchemaField {
                table: self.name.clone(),
                field,
            }),
            None => Ok(()),
        }
    }

    /// Delimiter as a single byte; non-ASCII delimiters fall back to `;`.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b';')
    }

    /// Comment character as a single byte.
    #[must_use]
    pub fn comment_byte(&self) -> Option<u8> {
        self.comment.and_then(|c| u8::try_from(c).ok())
    }

    /// Resolves every column reference to a zero-based index.
    ///
    /// A named column missing from the header leaves an optional field
    /// unmapped (every cell reads as absent).
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::MissingColumn`] if the named column of a
    /// required field or of the row filter is not in the header row.
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns, LoadError> {
        let index_of = |column: &ColumnRef| -> Option<usize> {
            match column {
                ColumnRef::Index(index) => Some(*index),
                ColumnRef::Name(name) => headers.iter().position(|header| header == name),
            }
        };
        let missing = |column: &ColumnRef| LoadError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        };
        let required = tables::required_fields(&self.name);

        let mut fields = BTreeMap::new();
        for (field, column) in &self.columns {
            match index_of(column) {
                Some(index) => {
                    fields.insert(field.clone(), index);
                }
                None if required.contains(&field.as_str()) => return Err(missing(column)),
                None => log::debug!("{}: optional column {column} not present", self.name),
            }
        }

        let filter = self
            .filter
            .as_ref()
            .map(|filter| {
                index_of(&filter.column)
                    .map(|index| (index, filter.equals.clone()))
                    .ok_or_else(|| missing(&filter.column))
            })
            .transpose()?;

        Ok(ResolvedColumns { fields, filter })
    }
}

/// Column indices for one file, resolved against its header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub(crate) fields: BTreeMap<String, usize>,
    pub(crate) filter: Option<(usize, Vec<String>)>,
}

impl ResolvedColumns {
    /// Index of a logical field, if mapped.
    #[must_use]
    pub fn index(&self, field: &str) -> Option<usize> {
        self.fields.get(field).copied()
    }
}
