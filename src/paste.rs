//! Clipboard paste handling.
//!
//! A paste is processed in two phases. [`PastePipeline::begin`] walks the
//! clipboard items in order, does all synchronous insertions and leaves a
//! placeholder wherever asynchronous work (image decode, metadata fetch)
//! is still running. The returned [`PendingPaste`] yields a [`Completion`]
//! per task as it finishes; applying it swaps the placeholder for the
//! final nodes. A completion whose placeholder is gone is stale and does
//! nothing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::editor::{Document, LinkCard, Node, NodeId, PlaceholderKind};
use crate::error::{FetchError, PasteError};
use crate::metadata::MetadataSource;
use crate::models::{ClipboardItem, LinkMetadata};

static YOUTUBE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*").expect("youtube regex")
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("url regex"));

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextKind {
    Video { video_id: String },
    Url,
    Plain,
}

/// YouTube video id from a share/watch/embed URL. Ids are 11 characters.
pub fn youtube_video_id(text: &str) -> Option<String> {
    let caps = YOUTUBE_REGEX.captures(text)?;
    let id = caps.get(2)?.as_str();
    (id.len() == 11).then(|| id.to_string())
}

pub fn classify_text(text: &str) -> TextKind {
    if let Some(video_id) = youtube_video_id(text) {
        return TextKind::Video { video_id };
    }
    if URL_REGEX.is_match(text) {
        return TextKind::Url;
    }
    TextKind::Plain
}

async fn decode_image(mime: String, bytes: Vec<u8>) -> Result<String, PasteError> {
    tokio::task::spawn_blocking(move || format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
        .await
        .map_err(|e| PasteError::ImageDecode(e.to_string()))
}

// ============================================================================
// Completions
// ============================================================================

/// Result of one asynchronous paste task, still to be applied.
#[derive(Debug)]
pub enum Completion {
    Image {
        placeholder: NodeId,
        result: Result<String, PasteError>,
    },
    Link {
        placeholder: NodeId,
        url: String,
        result: Result<LinkMetadata, FetchError>,
    },
}

/// What applying a completion did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Image,
    LinkPreview,
    PlainLink,
    /// The task failed and its placeholder was removed.
    Dropped,
    /// The placeholder was already gone; nothing changed.
    Stale,
}

impl Completion {
    pub fn placeholder(&self) -> NodeId {
        match self {
            Completion::Image { placeholder, .. } | Completion::Link { placeholder, .. } => {
                *placeholder
            }
        }
    }

    pub fn apply(self, doc: &mut Document) -> Applied {
        let placeholder = self.placeholder();
        if doc.get(placeholder).is_none() {
            tracing::debug!(placeholder, "placeholder gone, dropping stale paste completion");
            return Applied::Stale;
        }

        match self {
            Completion::Image { result: Ok(src), .. } => {
                doc.replace(placeholder, vec![Node::Image { src }]);
                Applied::Image
            }
            Completion::Image { result: Err(e), .. } => {
                tracing::warn!(error = %e, "image paste failed");
                doc.remove(placeholder);
                Applied::Dropped
            }
            Completion::Link {
                url,
                result: Ok(meta),
                ..
            } => {
                let text = if meta.title.is_empty() {
                    url.clone()
                } else {
                    meta.title.clone()
                };
                doc.replace(
                    placeholder,
                    vec![
                        Node::anchor(url, text),
                        Node::LineBreak,
                        Node::LinkCard(LinkCard::from_metadata(&meta)),
                        Node::LineBreak,
                    ],
                );
                Applied::LinkPreview
            }
            Completion::Link {
                url,
                result: Err(e),
                ..
            } => {
                tracing::warn!(%url, error = %e, "link preview failed, inserting plain link");
                doc.replace(placeholder, vec![Node::anchor(url.clone(), url)]);
                Applied::PlainLink
            }
        }
    }
}

/// Asynchronous work started by a paste.
#[derive(Default)]
pub struct PendingPaste {
    tasks: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl PendingPaste {
    fn push(&mut self, task: BoxFuture<'static, Completion>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next task to finish, in completion order.
    pub async fn next(&mut self) -> Option<Completion> {
        self.tasks.next().await
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Clone)]
pub struct PastePipeline {
    source: Arc<dyn MetadataSource>,
}

impl PastePipeline {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }

    /// Apply the synchronous part of a paste and start its async tasks.
    pub fn begin(&self, doc: &mut Document, items: Vec<ClipboardItem>) -> PendingPaste {
        let mut pending = PendingPaste::default();

        for item in items {
            match item {
                ClipboardItem::Image { mime, bytes } => {
                    let placeholder = doc.insert(Node::Placeholder {
                        kind: PlaceholderKind::Image,
                    });
                    pending.push(
                        async move {
                            Completion::Image {
                                placeholder,
                                result: decode_image(mime, bytes).await,
                            }
                        }
                        .boxed(),
                    );
                }
                ClipboardItem::Text(text) if text.is_empty() => {}
                ClipboardItem::Text(text) => match classify_text(&text) {
                    TextKind::Video { video_id } => {
                        doc.delete_selection();
                        doc.insert(Node::VideoEmbed { video_id });
                        doc.insert(Node::LineBreak);
                        break;
                    }
                    TextKind::Url => {
                        doc.delete_selection();
                        let placeholder = doc.insert(Node::Placeholder {
                            kind: PlaceholderKind::LinkPreview,
                        });
                        let url = text.trim().to_string();
                        let source = Arc::clone(&self.source);
                        pending.push(
                            async move {
                                let result = source.fetch_metadata(&url).await;
                                Completion::Link {
                                    placeholder,
                                    url,
                                    result,
                                }
                            }
                            .boxed(),
                        );
                    }
                    TextKind::Plain => {
                        doc.delete_selection();
                        doc.insert(Node::text(text));
                    }
                },
                ClipboardItem::Other { mime } => {
                    tracing::debug!(%mime, "ignoring clipboard item");
                }
            }
        }

        pending
    }

    /// Run a whole paste, applying completions as they arrive.
    pub async fn paste(&self, doc: &mut Document, items: Vec<ClipboardItem>) -> Vec<Applied> {
        let mut pending = self.begin(doc, items);
        let mut applied = Vec::with_capacity(pending.len());
        while let Some(completion) = pending.next().await {
            applied.push(completion.apply(doc));
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Selection;
    use crate::metadata::MetadataClient;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers from a fixed table; unknown URLs fail with 502.
    struct StubSource {
        pages: HashMap<String, LinkMetadata>,
    }

    #[async_trait]
    impl MetadataSource for StubSource {
        async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError> {
            self.pages.get(url).cloned().ok_or(FetchError::Status(502))
        }
    }

    fn pipeline_with(pages: &[LinkMetadata]) -> PastePipeline {
        let pages = pages.iter().map(|m| (m.url.clone(), m.clone())).collect();
        PastePipeline::new(Arc::new(StubSource { pages }))
    }

    fn example_meta() -> LinkMetadata {
        LinkMetadata {
            url: "https://example.com/post".to_string(),
            title: "A Post".to_string(),
            description: "About things".to_string(),
            image: "https://example.com/card.png".to_string(),
            favicon: "https://example.com/favicon.ico".to_string(),
            site_name: "Example".to_string(),
        }
    }

    fn text(s: &str) -> ClipboardItem {
        ClipboardItem::Text(s.to_string())
    }

    // ---- classification ----

    #[test]
    fn test_youtube_ids() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), id);
        assert_eq!(youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            id
        );
        assert_eq!(youtube_video_id("https://youtu.be/short"), None);
        assert_eq!(youtube_video_id("https://example.com/post"), None);
    }

    #[test]
    fn test_classify_text() {
        assert_eq!(
            classify_text("https://youtu.be/dQw4w9WgXcQ"),
            TextKind::Video {
                video_id: "dQw4w9WgXcQ".to_string()
            }
        );
        assert_eq!(classify_text("https://example.com/post"), TextKind::Url);
        assert_eq!(classify_text("http://example.com"), TextKind::Url);
        assert_eq!(classify_text("just some words"), TextKind::Plain);
        assert_eq!(classify_text("ftp://example.com"), TextKind::Plain);
    }

    // ---- pipeline ----

    #[tokio::test]
    async fn test_plain_text_replaces_selection() {
        let mut doc = Document::from_content(vec![Node::text("old"), Node::text(" tail")]);
        doc.select(0, 1);

        let applied = pipeline_with(&[]).paste(&mut doc, vec![text("new")]).await;

        assert!(applied.is_empty());
        assert_eq!(doc.text_content(), "new tail");
        assert_eq!(doc.selection(), Selection::caret(1));
    }

    #[tokio::test]
    async fn test_video_embed_stops_processing() {
        let mut doc = Document::new();
        let items = vec![
            text("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            text("never inserted"),
        ];

        pipeline_with(&[]).paste(&mut doc, items).await;

        assert_eq!(
            doc.content(),
            vec![
                Node::VideoEmbed {
                    video_id: "dQw4w9WgXcQ".to_string()
                },
                Node::LineBreak,
            ]
        );
        assert_eq!(doc.selection(), Selection::caret(2));
    }

    #[tokio::test]
    async fn test_url_becomes_link_and_card() {
        let meta = example_meta();
        let mut doc = Document::new();

        let applied = pipeline_with(&[meta.clone()])
            .paste(&mut doc, vec![text(&meta.url)])
            .await;

        assert_eq!(applied, vec![Applied::LinkPreview]);
        assert!(!doc.has_placeholders());
        let nodes: Vec<Node> = doc.nodes().cloned().collect();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], Node::anchor(&meta.url, "A Post"));
        assert_eq!(nodes[1], Node::LineBreak);
        match &nodes[2] {
            Node::LinkCard(card) => {
                assert_eq!(card.title, "A Post");
                assert_eq!(card.site_name, "Example");
                assert_eq!(card.image.as_deref(), Some("https://example.com/card.png"));
            }
            other => panic!("expected link card, got {:?}", other),
        }
        assert_eq!(nodes[3], Node::LineBreak);
        assert_eq!(doc.selection(), Selection::caret(4));
    }

    #[tokio::test]
    async fn test_failed_fetch_inserts_plain_link() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fetch-metadata"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let source = MetadataClient::new(reqwest::Client::new(), &mock_server.uri());
        let pipeline = PastePipeline::new(Arc::new(source));
        let url = "https://example.com/missing";
        let mut doc = Document::new();

        let applied = pipeline.paste(&mut doc, vec![text(url)]).await;

        assert_eq!(applied, vec![Applied::PlainLink]);
        assert_eq!(doc.content(), vec![Node::anchor(url, url)]);
        assert!(!doc.has_placeholders());
        assert!(!doc.to_html().contains("loading-indicator"));
        assert_eq!(doc.selection(), Selection::caret(1));
    }

    #[tokio::test]
    async fn test_placeholder_visible_while_pending() {
        let meta = example_meta();
        let mut doc = Document::new();
        let pipeline = pipeline_with(&[meta.clone()]);

        let mut pending = pipeline.begin(&mut doc, vec![text(&meta.url)]);
        assert_eq!(pending.len(), 1);
        assert!(doc.to_html().contains("Fetching link details..."));

        let completion = pending.next().await.unwrap();
        assert_eq!(completion.apply(&mut doc), Applied::LinkPreview);
        assert!(pending.next().await.is_none());
    }

    #[tokio::test]
    async fn test_completion_lands_at_placeholder() {
        let meta = example_meta();
        let mut doc = Document::new();
        let pipeline = pipeline_with(&[meta.clone()]);

        let mut pending = pipeline.begin(&mut doc, vec![text(&meta.url)]);
        // typing continues while the fetch is in flight
        doc.insert(Node::text(" typed later"));

        let completion = pending.next().await.unwrap();
        completion.apply(&mut doc);

        assert_eq!(doc.text_content(), "A Post\nA Post\nExample\n typed later");
        assert_eq!(doc.selection(), Selection::caret(4));
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let meta = example_meta();
        let mut doc = Document::new();
        let pipeline = pipeline_with(&[meta.clone()]);

        let mut pending = pipeline.begin(&mut doc, vec![text(&meta.url)]);
        let placeholder = doc.entries().next().map(|(id, _)| id).unwrap();
        doc.remove(placeholder);
        doc.insert(Node::text("user kept typing"));
        let before = doc.content();

        let completion = pending.next().await.unwrap();
        assert_eq!(completion.apply(&mut doc), Applied::Stale);
        assert_eq!(doc.content(), before);
    }

    #[tokio::test]
    async fn test_image_becomes_data_url() {
        let mut doc = Document::new();
        let items = vec![ClipboardItem::Image {
            mime: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }];

        let applied = pipeline_with(&[]).paste(&mut doc, items).await;

        assert_eq!(applied, vec![Applied::Image]);
        assert_eq!(
            doc.content(),
            vec![Node::Image {
                src: "data:image/png;base64,iVBORw==".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_mixed_items_keep_their_slots() {
        let meta = example_meta();
        let mut doc = Document::new();
        let items = vec![
            ClipboardItem::Image {
                mime: "image/gif".to_string(),
                bytes: b"GIF89a".to_vec(),
            },
            ClipboardItem::Other {
                mime: "text/html".to_string(),
            },
            text(&meta.url),
        ];

        let mut applied = pipeline_with(&[meta.clone()]).paste(&mut doc, items).await;
        applied.sort_by_key(|a| *a as u8);

        assert_eq!(applied, vec![Applied::Image, Applied::LinkPreview]);
        let nodes: Vec<Node> = doc.nodes().cloned().collect();
        assert!(matches!(nodes[0], Node::Image { .. }));
        assert_eq!(nodes[1], Node::anchor(&meta.url, "A Post"));
        assert_eq!(nodes.len(), 5);
    }

    #[test]
    fn test_failed_image_removes_placeholder() {
        let mut doc = Document::new();
        doc.insert(Node::text("before"));
        let placeholder = doc.insert(Node::Placeholder {
            kind: PlaceholderKind::Image,
        });
        doc.insert(Node::text("after"));

        let completion = Completion::Image {
            placeholder,
            result: Err(PasteError::ImageDecode("task panicked".to_string())),
        };

        assert_eq!(completion.apply(&mut doc), Applied::Dropped);
        assert!(!doc.has_placeholders());
        assert_eq!(doc.content(), vec![Node::text("before"), Node::text("after")]);
        assert_eq!(doc.selection(), Selection::caret(2));
    }
}
