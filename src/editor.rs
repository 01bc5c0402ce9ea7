//! The editor surface as an explicit content tree.
//!
//! A [`Document`] is a flat sequence of content nodes with a selection
//! between them. Every node gets a [`NodeId`] when it enters the document;
//! ids are never reused, so a stale handle simply stops resolving.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::mem;
use url::Url;

use crate::models::LinkMetadata;

pub type NodeId = u64;

/// Persisted form of a document: its nodes in order, placeholders removed.
pub type Content = Vec<Node>;

/// Where a freshly created link points until the user edits it.
pub const NEW_LINK_HREF: &str = "https://";

/// Inline formatting on text and links.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
}

impl Mark {
    fn tag(self) -> &'static str {
        match self {
            Mark::Bold => "b",
            Mark::Italic => "i",
            Mark::Underline => "u",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        marks: BTreeSet<Mark>,
    },
    LineBreak,
    Anchor {
        href: String,
        text: String,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        marks: BTreeSet<Mark>,
    },
    Image { src: String },
    LinkCard(LinkCard),
    VideoEmbed { video_id: String },
    Placeholder { kind: PlaceholderKind },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    /// Visible "Fetching link details..." indicator.
    LinkPreview,
    /// Reserves the spot for an image that is still decoding.
    Image,
}

/// A rendered summary of a pasted URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkCard {
    pub url: String,
    pub title: String,
    pub site_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl LinkCard {
    pub fn from_metadata(meta: &LinkMetadata) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let title = non_empty(meta.title.as_str()).unwrap_or_else(|| "Untitled".to_string());
        let site_name = non_empty(meta.site_name.as_str()).unwrap_or_else(|| {
            Url::parse(&meta.url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| meta.url.clone())
        });

        Self {
            url: meta.url.clone(),
            title,
            site_name,
            image: non_empty(meta.image.as_str()),
            favicon: non_empty(meta.favicon.as_str()),
        }
    }
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text {
            text: text.into(),
            marks: BTreeSet::new(),
        }
    }

    pub fn anchor(href: impl Into<String>, text: impl Into<String>) -> Self {
        Node::Anchor {
            href: href.into(),
            text: text.into(),
            marks: BTreeSet::new(),
        }
    }

    /// Same node with `marks` added. Only text and links carry marks.
    pub fn with_marks(mut self, extra: impl IntoIterator<Item = Mark>) -> Self {
        if let Some(marks) = self.marks_mut() {
            marks.extend(extra);
        }
        self
    }

    pub fn marks(&self) -> Option<&BTreeSet<Mark>> {
        match self {
            Node::Text { marks, .. } | Node::Anchor { marks, .. } => Some(marks),
            _ => None,
        }
    }

    fn marks_mut(&mut self) -> Option<&mut BTreeSet<Mark>> {
        match self {
            Node::Text { marks, .. } | Node::Anchor { marks, .. } => Some(marks),
            _ => None,
        }
    }

    /// Blocks that carry a dismiss control.
    pub fn is_dismissable(&self) -> bool {
        matches!(self, Node::LinkCard(_) | Node::VideoEmbed { .. })
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Node::Placeholder { .. })
    }
}

/// Caret or range between nodes. Positions run from `0` to `len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn caret(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone)]
struct Element {
    id: NodeId,
    node: Node,
}

#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    selection: Selection,
    next_id: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            selection: Selection::default(),
            next_id: 1,
        }
    }

    pub fn from_content(content: Content) -> Self {
        let mut doc = Self::new();
        doc.load(content);
        doc
    }

    /// Replace everything with `content` and put the caret at the end.
    pub fn load(&mut self, content: Content) {
        self.elements.clear();
        for node in content.into_iter().filter(|n| !n.is_placeholder()) {
            let id = self.allocate_id();
            self.elements.push(Element { id, node });
        }
        self.selection = Selection::caret(self.elements.len());
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.selection = Selection::default();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.elements.iter().map(|e| &e.node)
    }

    pub fn entries(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.elements.iter().map(|e| (e.id, &e.node))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.elements.iter().find(|e| e.id == id).map(|e| &e.node)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    pub fn has_placeholders(&self) -> bool {
        self.nodes().any(Node::is_placeholder)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn set_caret(&mut self, pos: usize) {
        self.selection = Selection::caret(pos.min(self.len()));
    }

    pub fn select(&mut self, start: usize, end: usize) {
        let (a, b) = (start.min(self.len()), end.min(self.len()));
        self.selection = Selection {
            start: a.min(b),
            end: a.max(b),
        };
    }

    /// Move the caret directly after `id`.
    pub fn move_after(&mut self, id: NodeId) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.selection = Selection::caret(pos + 1);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Insert at the start of the selection and leave the caret after the
    /// new node.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let pos = self.selection.start;
        let id = self.insert_at(pos, node);
        self.selection = Selection::caret(pos + 1);
        id
    }

    /// Remove the selected nodes and collapse the caret to where they were.
    pub fn delete_selection(&mut self) -> Vec<Node> {
        let Selection { start, end } = self.selection;
        let removed = self.elements.drain(start..end).map(|e| e.node).collect();
        self.selection = Selection::caret(start);
        removed
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let pos = self.position(id)?;
        let element = self.elements.remove(pos);
        let shift = |p: usize| if p > pos { p - 1 } else { p };
        self.selection = Selection {
            start: shift(self.selection.start),
            end: shift(self.selection.end),
        };
        Some(element.node)
    }

    /// Swap `id` for `nodes` in place and put the caret after the last one.
    /// Returns the new ids, or `None` when `id` is no longer present.
    pub fn replace(&mut self, id: NodeId, nodes: Vec<Node>) -> Option<Vec<NodeId>> {
        let pos = self.position(id)?;
        self.remove(id);

        let ids: Vec<NodeId> = nodes
            .into_iter()
            .enumerate()
            .map(|(offset, node)| self.insert_at(pos + offset, node))
            .collect();
        self.selection = Selection::caret(pos + ids.len());
        Some(ids)
    }

    /// Remove a link card or video embed. Other nodes are left alone.
    pub fn dismiss(&mut self, id: NodeId) -> bool {
        match self.get(id) {
            Some(node) if node.is_dismissable() => self.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn update_link(&mut self, id: NodeId, new_href: &str) -> bool {
        match self.elements.iter_mut().find(|e| e.id == id) {
            Some(Element {
                node: Node::Anchor { href, .. },
                ..
            }) => {
                *href = new_href.to_string();
                true
            }
            _ => false,
        }
    }

    /// Turn an anchor back into plain text, keeping its formatting.
    pub fn unlink(&mut self, id: NodeId) -> bool {
        match self.elements.iter_mut().find(|e| e.id == id) {
            Some(element) => match &mut element.node {
                Node::Anchor { text, marks, .. } => {
                    let (text, marks) = (mem::take(text), mem::take(marks));
                    element.node = Node::Text { text, marks };
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Split a text or link node `at` characters in. Both halves keep the
    /// node's marks (and href). Returns the id of the second half, or
    /// `None` when `at` is not strictly inside the text.
    ///
    /// A selection that covered the whole node covers both halves.
    pub fn split_text(&mut self, id: NodeId, at: usize) -> Option<NodeId> {
        let pos = self.position(id)?;
        let second = match &mut self.elements[pos].node {
            Node::Text { text, marks } => Node::Text {
                text: split_chars(text, at)?,
                marks: marks.clone(),
            },
            Node::Anchor { href, text, marks } => Node::Anchor {
                href: href.clone(),
                text: split_chars(text, at)?,
                marks: marks.clone(),
            },
            _ => return None,
        };

        let covered = self.selection.start <= pos && self.selection.end == pos + 1;
        let new_id = self.insert_at(pos + 1, second);
        if covered {
            self.selection.end = pos + 2;
        }
        Some(new_id)
    }

    /// Toggle `mark` on the text and links in the selection. The mark is
    /// removed when all of them already carry it and added otherwise.
    /// Returns `false` when the selection holds no text.
    pub fn toggle_mark(&mut self, mark: Mark) -> bool {
        let Selection { start, end } = self.selection;
        let mut targets: Vec<&mut BTreeSet<Mark>> = self.elements[start..end]
            .iter_mut()
            .filter_map(|e| e.node.marks_mut())
            .collect();
        if targets.is_empty() {
            return false;
        }

        let remove = targets.iter().all(|marks| marks.contains(&mark));
        for marks in targets.iter_mut() {
            if remove {
                marks.remove(&mark);
            } else {
                marks.insert(mark);
            }
        }
        true
    }

    /// Make the selected text a link to `href`. Links already in the
    /// selection are retargeted. Returns the ids of the selected links;
    /// empty when nothing linkable is selected.
    pub fn link_selection(&mut self, new_href: &str) -> Vec<NodeId> {
        let Selection { start, end } = self.selection;
        let mut linked = Vec::new();

        for element in &mut self.elements[start..end] {
            match &mut element.node {
                Node::Anchor { href, .. } => *href = new_href.to_string(),
                Node::Text { text, marks } => {
                    let (text, marks) = (mem::take(text), mem::take(marks));
                    element.node = Node::Anchor {
                        href: new_href.to_string(),
                        text,
                        marks,
                    };
                }
                _ => continue,
            }
            linked.push(element.id);
        }
        linked
    }

    fn insert_at(&mut self, pos: usize, node: Node) -> NodeId {
        let pos = pos.min(self.len());
        let id = self.allocate_id();
        self.elements.insert(pos, Element { id, node });
        let shift = |p: usize| if p > pos { p + 1 } else { p };
        self.selection = Selection {
            start: shift(self.selection.start),
            end: shift(self.selection.end),
        };
        id
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub fn content(&self) -> Content {
        self.nodes()
            .filter(|n| !n.is_placeholder())
            .cloned()
            .collect()
    }

    pub fn text_content(&self) -> String {
        text_content(self.nodes())
    }

    pub fn to_html(&self) -> String {
        self.entries()
            .map(|(id, node)| render_node(id, node))
            .collect()
    }
}

fn split_chars(text: &mut String, at: usize) -> Option<String> {
    let byte = text
        .char_indices()
        .nth(at)
        .map(|(i, _)| i)
        .filter(|&i| i > 0)?;
    Some(text.split_off(byte))
}

/// Readable text of a node sequence: line breaks become `\n`, embeds
/// contribute nothing, cards contribute their title and site name.
pub fn text_content<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text { text, .. } | Node::Anchor { text, .. } => out.push_str(text),
            Node::LineBreak => out.push('\n'),
            Node::LinkCard(card) => {
                out.push_str(&card.title);
                out.push('\n');
                out.push_str(&card.site_name);
            }
            Node::Image { .. } | Node::VideoEmbed { .. } | Node::Placeholder { .. } => {}
        }
    }
    out
}

// ============================================================================
// Markup
// ============================================================================

const CLOSE_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M18 6L6 18M6 6l12 12"/></svg>"#;

pub fn youtube_embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}?rel=0", video_id)
}

/// Wrap `inner` in one element per mark, bold outermost.
fn render_marks(marks: &BTreeSet<Mark>, inner: &str) -> String {
    let open: String = marks.iter().map(|m| format!("<{}>", m.tag())).collect();
    let close: String = marks.iter().rev().map(|m| format!("</{}>", m.tag())).collect();
    format!("{}{}{}", open, inner, close)
}

fn render_node(id: NodeId, node: &Node) -> String {
    match node {
        Node::Text { text, marks } => render_marks(marks, &encode_text(text)),
        Node::LineBreak => "<br>".to_string(),
        Node::Anchor { href, text, marks } => format!(
            r#"<a href="{}" data-node-id="{}">{}</a>"#,
            encode_double_quoted_attribute(href),
            id,
            render_marks(marks, &encode_text(text))
        ),
        Node::Image { src } => format!(
            r#"<img src="{}" class="editor-image" alt="">"#,
            encode_double_quoted_attribute(src)
        ),
        Node::LinkCard(card) => render_link_card(id, card),
        Node::VideoEmbed { video_id } => format!(
            concat!(
                r#"<div class="youtube-container" contenteditable="false" data-node-id="{id}">"#,
                r#"<iframe class="youtube-embed" src="{src}" title="YouTube video player" frameborder="0" "#,
                r#"allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe>"#,
                r#"<button class="youtube-card-close" aria-label="Remove embed" data-dismiss="{id}">✕</button></div>"#
            ),
            id = id,
            src = encode_double_quoted_attribute(&youtube_embed_url(video_id)),
        ),
        Node::Placeholder {
            kind: PlaceholderKind::LinkPreview,
        } => concat!(
            r#"<div class="loading-indicator"><div class="loading-spinner"></div>"#,
            r#"<span>Fetching link details...</span></div>"#
        )
        .to_string(),
        Node::Placeholder {
            kind: PlaceholderKind::Image,
        } => String::new(),
    }
}

fn render_link_card(id: NodeId, card: &LinkCard) -> String {
    let image = card
        .image
        .as_deref()
        .map(|src| {
            format!(
                r#"<div class="link-card-image"><img src="{}" alt="" loading="lazy" /></div>"#,
                encode_double_quoted_attribute(src)
            )
        })
        .unwrap_or_default();
    let favicon = card
        .favicon
        .as_deref()
        .map(|src| {
            format!(
                r#"<img src="{}" alt="" class="link-card-favicon" />"#,
                encode_double_quoted_attribute(src)
            )
        })
        .unwrap_or_default();

    format!(
        concat!(
            r#"<div class="link-card" data-node-id="{id}">"#,
            r#"<button class="link-card-close" aria-label="Remove embed" data-dismiss="{id}">{close}</button>"#,
            r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{image}"#,
            r#"<div class="link-card-content"><div class="link-card-title">{favicon}<span>{title}</span></div>"#,
            r#"<div class="link-card-site">{site}</div></div></a></div>"#
        ),
        id = id,
        close = CLOSE_ICON,
        url = encode_double_quoted_attribute(&card.url),
        image = image,
        favicon = favicon,
        title = encode_text(&card.title),
        site = encode_text(&card.site_name),
    )
}
