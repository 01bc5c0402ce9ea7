//! linknotes library - note-taking core and link preview backend.
//!
//! This module exposes the application's modules for the server binary,
//! for tests, and for embedding the editor core elsewhere.

pub mod config;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod metadata;
pub mod models;
pub mod paste;
pub mod store;
pub mod tags;
pub mod url_validator;
pub mod workspace;

use config::FetchConfig;
use error::FetchError;
use metadata::MetadataFetcher;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub fetcher: MetadataFetcher,
}

impl AppState {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: MetadataFetcher::new(config)?,
        })
    }
}

// Re-export commonly used types
pub use models::{ClipboardItem, FetchMetadataRequest, LinkMetadata, Note, NoteId, NoteSummary};

pub use editor::{
    Content, Document, LinkCard, Mark, Node, NodeId, PlaceholderKind, Selection, NEW_LINK_HREF,
};

pub use error::{PasteError, StoreError};

pub use metadata::{extract_metadata, resolve_asset_url, title_from_url, MetadataClient, MetadataSource};

pub use paste::{classify_text, youtube_video_id, Applied, Completion, PastePipeline, PendingPaste, TextKind};

pub use store::{KeyValueStore, MemoryStore, NoteStore, SledStore, NOTES_KEY};

pub use tags::extract_tags;

pub use url_validator::{public_redirect_policy, validate_url, PublicResolver, UrlValidationError};

pub use workspace::Workspace;

pub use config::Config;
