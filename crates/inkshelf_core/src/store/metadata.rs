//! Decoding of one on-disk metadata record.
//!
//! # Responsibility
//! - Parse the JSON document the device writes for each item.
//! - Normalize raw fields into the typed [`Item`] shape.
//!
//! # Invariants
//! - The canonical `VisibleName` key wins over the legacy misspelled
//!   `VissibleName` when both are present.
//! - `ModifiedClient` must match the fixed device layout
//!   `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
//! - Unknown keys are ignored; the device writes more than this reader
//!   needs.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::model::item::{Item, ItemKind, ParentRef};

/// Timestamp layout the device uses for `ModifiedClient`.
const MODIFIED_CLIENT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Raw `Type` value marking folders; anything else is a document.
const COLLECTION_TYPE: &str = "CollectionType";

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Failure while decoding one metadata record.
#[derive(Debug)]
pub enum MetadataError {
    /// The record is not the JSON document shape the device writes.
    Json(serde_json::Error),
    /// The record carries neither name key.
    MissingName { id: String },
    /// `ModifiedClient` does not match the fixed device layout.
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed metadata document: {err}"),
            Self::MissingName { id } => {
                write!(f, "metadata record `{id}` carries no visible name")
            }
            Self::Timestamp { value, source } => {
                write!(f, "invalid ModifiedClient timestamp `{value}`: {source}")
            }
        }
    }
}

impl Error for MetadataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::MissingName { .. } => None,
            Self::Timestamp { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Wire shape of a record. Field names follow the device's JSON keys.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "VisibleName")]
    visible_name: Option<String>,
    /// Long-standing producer typo, still emitted by old software.
    #[serde(rename = "VissibleName")]
    visible_name_legacy: Option<String>,
    /// Absent on some older records; treated as a document then.
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Parent")]
    parent: String,
    #[serde(rename = "Bookmarked")]
    bookmarked: bool,
    #[serde(rename = "ModifiedClient")]
    modified_client: String,
}

/// Parses one metadata document into an unlinked [`Item`].
pub fn parse_record(raw_json: &str) -> MetadataResult<Item> {
    let raw: RawRecord = serde_json::from_str(raw_json)?;

    let name = match raw.visible_name.or(raw.visible_name_legacy) {
        Some(name) => name,
        None => return Err(MetadataError::MissingName { id: raw.id }),
    };
    let modified_at = parse_modified_client(&raw.modified_client)?;
    let kind = match raw.kind.as_deref() {
        Some(COLLECTION_TYPE) => ItemKind::Collection,
        _ => ItemKind::Document,
    };

    Ok(Item::new(
        raw.id,
        name,
        kind,
        ParentRef::from_raw(&raw.parent),
        raw.bookmarked,
        modified_at,
    ))
}

fn parse_modified_client(value: &str) -> MetadataResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, MODIFIED_CLIENT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| MetadataError::Timestamp {
            value: value.to_string(),
            source,
        })
}
