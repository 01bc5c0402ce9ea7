//! The note-taking session: one editor, the saved notes, and which note
//! (if any) the editor is showing.

use chrono::{Local, Utc};
use std::path::Path;

use crate::editor::{text_content, Document, Node};
use crate::error::StoreError;
use crate::models::{Note, NoteId, NoteSummary};
use crate::store::{KeyValueStore, NoteStore, SledStore};
use crate::tags::extract_tags;

const SUMMARY_CHARS: usize = 60;

pub struct Workspace<K> {
    store: NoteStore<K>,
    editor: Document,
    selected: Option<NoteId>,
    highlighted: usize,
    last_id: NoteId,
}

impl Workspace<SledStore> {
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(SledStore::open(path)?)
    }
}

impl<K: KeyValueStore> Workspace<K> {
    pub fn open(kv: K) -> Result<Self, StoreError> {
        let store = NoteStore::open(kv)?;
        let last_id = store.notes().iter().map(|n| n.id).max().unwrap_or(0);
        Ok(Self {
            store,
            editor: Document::new(),
            selected: None,
            highlighted: 0,
            last_id,
        })
    }

    pub fn editor(&self) -> &Document {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Document {
        &mut self.editor
    }

    pub fn notes(&self) -> &[Note] {
        self.store.notes()
    }

    pub fn selected(&self) -> Option<NoteId> {
        self.selected
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    /// Save the editor as a note: a new one, or the selected one in place.
    /// Blank editors are not saved.
    pub fn save(&mut self) -> Result<Option<NoteId>, StoreError> {
        let text = self.editor.text_content();
        if text.trim().is_empty() {
            return Ok(None);
        }

        let id = match self.selected {
            Some(id) => id,
            None => self.next_id(),
        };
        let note = Note {
            id,
            timestamp: Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
            content: self.editor.content(),
            tags: extract_tags(&text),
        };

        self.store.upsert(note)?;
        tracing::info!(id, "note saved");
        self.clear();
        Ok(Some(id))
    }

    /// Show a saved note in the editor.
    pub fn select(&mut self, id: NoteId) -> bool {
        let Some(index) = self.store.position(id) else {
            return false;
        };
        self.editor.load(self.store.notes()[index].content.clone());
        self.selected = Some(id);
        self.highlighted = index;
        true
    }

    pub fn delete(&mut self, id: NoteId) -> Result<bool, StoreError> {
        let removed = self.store.delete(id)?;
        if removed && self.selected == Some(id) {
            self.clear();
        }
        if self.highlighted >= self.store.len() {
            self.highlighted = self.store.len().saturating_sub(1);
        }
        Ok(removed)
    }

    /// Empty the editor and forget the selection.
    pub fn clear(&mut self) {
        self.editor.clear();
        self.selected = None;
    }

    /// Move the sidebar highlight by `direction`, wrapping at both ends.
    pub fn navigate(&mut self, direction: isize) {
        let len = self.store.len() as isize;
        if len == 0 {
            return;
        }
        self.highlighted = (self.highlighted as isize + direction).rem_euclid(len) as usize;
    }

    pub fn select_highlighted(&mut self) -> bool {
        match self.store.notes().get(self.highlighted) {
            Some(note) => {
                let id = note.id;
                self.select(id)
            }
            None => false,
        }
    }

    pub fn summaries(&self) -> Vec<NoteSummary> {
        self.store.notes().iter().map(summarize).collect()
    }

    fn next_id(&mut self) -> NoteId {
        let id = Utc::now().timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        id
    }
}

fn summarize(note: &Note) -> NoteSummary {
    let text = text_content(&note.content);
    let summary = if text.chars().count() > SUMMARY_CHARS {
        format!("{}...", text.chars().take(SUMMARY_CHARS).collect::<String>())
    } else {
        text
    };

    NoteSummary {
        id: note.id,
        timestamp: note.timestamp.clone(),
        first_line: first_line(&note.content),
        summary,
        tags: note.tags.clone(),
        has_image: note.content.iter().any(shows_image),
        has_video: note
            .content
            .iter()
            .any(|n| matches!(n, Node::VideoEmbed { .. })),
    }
}

/// Pasted images, and link cards rendered with a preview image or favicon.
fn shows_image(node: &Node) -> bool {
    match node {
        Node::Image { .. } => true,
        Node::LinkCard(card) => card.image.is_some() || card.favicon.is_some(),
        _ => false,
    }
}

/// Text and link text up to the first line break.
fn first_line(content: &[Node]) -> String {
    let mut line = String::new();
    for node in content {
        match node {
            Node::Text { text, .. } | Node::Anchor { text, .. } => line.push_str(text),
            Node::LineBreak if !line.trim().is_empty() => break,
            _ => {}
        }
    }

    let first = line.trim().lines().next().unwrap_or("").trim();
    if first.is_empty() {
        "Empty note".to_string()
    } else {
        first.to_string()
    }
}
