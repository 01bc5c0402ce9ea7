//! Data models shared by the store, the editor and the HTTP endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::editor::Content;

// ============================================================================
// Notes
// ============================================================================

pub type NoteId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub timestamp: String,
    pub content: Content,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Sidebar view of a note.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NoteSummary {
    pub id: NoteId,
    pub timestamp: String,
    pub first_line: String,
    pub summary: String,
    pub tags: BTreeSet<String>,
    pub has_image: bool,
    pub has_video: bool,
}

// ============================================================================
// Link Metadata
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetadata {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(default)]
    pub site_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchMetadataRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Clipboard
// ============================================================================

/// One typed entry of a paste event, in clipboard order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardItem {
    Image { mime: String, bytes: Vec<u8> },
    Text(String),
    Other { mime: String },
}
