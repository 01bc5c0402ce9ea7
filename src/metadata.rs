//! Link metadata: fetch a page and pull out what a preview card needs.
//!
//! Extraction reads Open Graph tags first and falls back to plain HTML
//! (`<title>`, `name=description`, `rel=icon`). Each field is described by
//! an ordered chain of extractors; the first non-empty value wins.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::error::Error as _;
use std::sync::{Arc, LazyLock};
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::models::{FetchMetadataRequest, LinkMetadata};
use crate::url_validator::{public_redirect_policy, validate_url, PublicResolver, UrlValidationError};

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(meta|link)\b([^>]*)>").expect("tag regex"));

static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute regex")
});

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));

// ============================================================================
// Metadata Sources
// ============================================================================

/// Anything that can turn a URL into link metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError>;
}

/// Fetches pages directly and parses them.
#[derive(Clone)]
pub struct MetadataFetcher {
    client: Client,
    allow_private_hosts: bool,
}

impl MetadataFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(config)?,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<LinkMetadata, FetchError> {
        let page_url = validate_url(url, self.allow_private_hosts).await?;

        tracing::info!(%url, "fetching metadata");
        let response = self
            .client
            .get(page_url)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let metadata = extract_metadata(&html, url.trim());
        tracing::debug!(?metadata, "metadata fetched");

        Ok(metadata)
    }
}

/// Unless private hosts are allowed, redirects are re-validated hop by hop
/// and names resolve only to public addresses.
fn build_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone());

    if config.allow_private_hosts {
        builder.build()
    } else {
        builder
            .redirect(public_redirect_policy())
            .dns_resolver(Arc::new(PublicResolver))
            .build()
    }
}

/// Surface a refused redirect or resolution as `Blocked` rather than a
/// generic network failure.
fn request_error(err: reqwest::Error) -> FetchError {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(refused) = cause.downcast_ref::<UrlValidationError>() {
            return refused.clone().into();
        }
        source = cause.source();
    }
    FetchError::Network(err)
}

#[async_trait]
impl MetadataSource for MetadataFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError> {
        self.fetch(url).await
    }
}

/// Calls a remote `/api/fetch-metadata` endpoint, the way the editor talks
/// to the server.
#[derive(Clone)]
pub struct MetadataClient {
    client: Client,
    endpoint: String,
}

impl MetadataClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/fetch-metadata", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&FetchMetadataRequest {
                url: url.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<LinkMetadata>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

// ============================================================================
// HTML Parsing
// ============================================================================

/// The parts of a document that metadata extraction looks at.
#[derive(Debug, Default)]
struct Page {
    metas: Vec<HashMap<String, String>>,
    links: Vec<HashMap<String, String>>,
    title: Option<String>,
}

impl Page {
    fn parse(html: &str) -> Self {
        let mut page = Page::default();

        for caps in TAG_REGEX.captures_iter(html) {
            let attrs = parse_attributes(&caps[2]);
            if caps[1].eq_ignore_ascii_case("meta") {
                page.metas.push(attrs);
            } else {
                page.links.push(attrs);
            }
        }

        page.title = TITLE_REGEX
            .captures(html)
            .map(|caps| html_entity_decode(caps[1].trim()));

        page
    }

    /// `content` of the first `<meta>` whose `attr` equals `value`.
    fn meta(&self, attr: &str, value: &str) -> Option<String> {
        self.metas
            .iter()
            .find(|m| m.get(attr).map(String::as_str) == Some(value))
            .and_then(|m| m.get("content"))
            .map(|c| c.trim().to_string())
    }

    /// `href` of the first `<link>` whose `rel` equals `rel`.
    fn link_href(&self, rel: &str) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.get("rel").map(String::as_str) == Some(rel))
            .and_then(|l| l.get("href"))
            .map(|h| h.trim().to_string())
    }
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTR_REGEX
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            (name, html_entity_decode(value))
        })
        .collect()
}

/// Decode named and numeric character references (`&amp;`, `&mdash;`,
/// `&#8217;`, `&#x2014;`).
fn html_entity_decode(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

// ============================================================================
// Fallback Chains
// ============================================================================

type Extractor = fn(&Page) -> Option<String>;

fn og_title(p: &Page) -> Option<String> {
    p.meta("property", "og:title")
}
fn html_title(p: &Page) -> Option<String> {
    p.title.clone()
}
fn og_description(p: &Page) -> Option<String> {
    p.meta("property", "og:description")
}
fn meta_description(p: &Page) -> Option<String> {
    p.meta("name", "description")
}
fn og_image(p: &Page) -> Option<String> {
    p.meta("property", "og:image")
}
fn twitter_image(p: &Page) -> Option<String> {
    p.meta("name", "twitter:image")
}
fn icon(p: &Page) -> Option<String> {
    p.link_href("icon")
}
fn shortcut_icon(p: &Page) -> Option<String> {
    p.link_href("shortcut icon")
}
fn og_site_name(p: &Page) -> Option<String> {
    p.meta("property", "og:site_name")
}

const TITLE_CHAIN: &[Extractor] = &[og_title, html_title];
const DESCRIPTION_CHAIN: &[Extractor] = &[og_description, meta_description];
const IMAGE_CHAIN: &[Extractor] = &[og_image, twitter_image];
const FAVICON_CHAIN: &[Extractor] = &[icon, shortcut_icon];
const SITE_NAME_CHAIN: &[Extractor] = &[og_site_name];

fn first_of(chain: &[Extractor], page: &Page) -> Option<String> {
    chain
        .iter()
        .filter_map(|extract| extract(page))
        .find(|value| !value.is_empty())
}

/// Build link metadata for `url` from its HTML.
pub fn extract_metadata(html: &str, url: &str) -> LinkMetadata {
    let page = Page::parse(html);
    let page_url = Url::parse(url).ok();

    let title = first_of(TITLE_CHAIN, &page).unwrap_or_else(|| title_from_url(url));
    let description = first_of(DESCRIPTION_CHAIN, &page).unwrap_or_default();
    let image = first_of(IMAGE_CHAIN, &page).unwrap_or_default();
    let favicon = first_of(FAVICON_CHAIN, &page).unwrap_or_default();
    let site_name = first_of(SITE_NAME_CHAIN, &page).unwrap_or_else(|| {
        page_url
            .as_ref()
            .and_then(host_label)
            .unwrap_or_else(|| url.to_string())
    });

    let (image, favicon) = match &page_url {
        Some(base) => (resolve_asset_url(&image, base), resolve_asset_url(&favicon, base)),
        None => (image, favicon),
    };

    LinkMetadata {
        url: url.to_string(),
        title,
        description,
        image,
        favicon,
        site_name,
    }
}

// ============================================================================
// URL Helpers
// ============================================================================

fn host_label(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// A readable label for a URL when the page offers no title.
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if let Some(label) = listing_label(&parsed, url) {
        return label;
    }

    host_label(&parsed).unwrap_or_else(|| url.to_string())
}

/// Zillow listing URLs carry the street address in the path:
/// `/homedetails/123-Main-St-Springfield-IL-62701/1234_zpid/`.
/// A listing path without the address segment labels as the raw URL.
fn listing_label(url: &Url, raw: &str) -> Option<String> {
    let host = url.host_str()?;
    if !host.contains("zillow.com") {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "homedetails" {
        return None;
    }
    match segments.next() {
        Some(address) => Some(format!("Zillow: {}", address.replace('-', " "))),
        None => Some(raw.to_string()),
    }
}

/// Make an image or favicon reference absolute against the page's origin.
/// Unresolvable values come back unchanged.
pub fn resolve_asset_url(value: &str, page_url: &Url) -> String {
    if value.is_empty() || value.starts_with("http") {
        return value.to_string();
    }

    let origin = page_url.origin().ascii_serialization();
    Url::parse(&origin)
        .and_then(|base| base.join(value))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| value.to_string())
}
