//! Persisted article document
//!
//! An article lives on disk as a single text file: a YAML metadata block
//! delimited by `---` lines, followed by the Markdown body.
//!
//! ```text
//! ---
//! created_date: 2024-11-02 09:30:00
//! author: zsai
//! tags: []
//! publishable: true
//! published: false
//! ---
//! # Title
//!
//! Body text...
//! ```
//!
//! Parsing and serialization are exact inverses: a document saved and
//! reloaded reproduces identical metadata and body.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Timestamp format used by document metadata fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Document errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read article '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to write article '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid metadata block: {0}")]
    InvalidMeta(String),
}

/// Cover image reference stored in document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverImageRef {
    /// Identifier of the photo in the cover library
    pub photo_id: String,
    /// Path (or URL) of the composite cover image
    pub url: String,
}

/// Article document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMeta {
    /// Creation timestamp, `%Y-%m-%d %H:%M:%S`
    #[serde(default = "default_created_date")]
    pub created_date: String,
    /// Author name
    #[serde(default = "default_author")]
    pub author: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the article is ready to publish
    #[serde(default)]
    pub publishable: bool,
    /// Whether the article has been published
    #[serde(default)]
    pub published: bool,
    /// Publication timestamp, set on success
    #[serde(default)]
    pub publish_date: Option<String>,
    /// Public article URL, set on success
    #[serde(default)]
    pub publish_url: Option<String>,
    /// Cover image reference
    #[serde(default)]
    pub cover_image: Option<CoverImageRef>,
    /// Optional digest override used for the draft payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

fn default_created_date() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

fn default_author() -> String {
    "zsai".to_string()
}

impl Default for ArticleMeta {
    fn default() -> Self {
        Self {
            created_date: default_created_date(),
            author: default_author(),
            tags: Vec::new(),
            publishable: false,
            published: false,
            publish_date: None,
            publish_url: None,
            cover_image: None,
            digest: None,
        }
    }
}

/// An article document: metadata plus Markdown body
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDocument {
    pub meta: ArticleMeta,
    pub body: String,
}

impl ArticleDocument {
    /// Creates a document with default metadata around a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            meta: ArticleMeta::default(),
            body: body.into(),
        }
    }

    /// Parses a document from its on-disk text form.
    ///
    /// A file without a leading metadata block parses as default metadata
    /// with the whole text as body. A present-but-malformed block is an
    /// error rather than silently becoming body text.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let Some(rest) = content.strip_prefix("---\n") else {
            return Ok(Self::new(content));
        };

        let Some(end) = rest.find("\n---\n") else {
            return Ok(Self::new(content));
        };

        let yaml = &rest[..end];
        let body = &rest[end + "\n---\n".len()..];

        let meta: ArticleMeta = serde_yaml::from_str(yaml)
            .map_err(|e| DocumentError::InvalidMeta(e.to_string()))?;

        Ok(Self {
            meta,
            body: body.to_string(),
        })
    }

    /// Serializes the document back to its on-disk text form.
    pub fn to_text(&self) -> Result<String, DocumentError> {
        let yaml = serde_yaml::to_string(&self.meta)
            .map_err(|e| DocumentError::InvalidMeta(e.to_string()))?;
        Ok(format!("---\n{}---\n{}", yaml, self.body))
    }

    /// Loads a document from a file.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Saves the document to a file.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let text = self.to_text()?;
        std::fs::write(path, text).map_err(|e| DocumentError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Extracts a title from the body: the first `#` heading, else the
    /// first non-empty line, with any `#` characters stripped.
    pub fn title(&self) -> String {
        for line in self.body.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(heading) = trimmed.strip_prefix('#') {
                return heading.trim_start_matches('#').trim().to_string();
            }
            return trimmed.replace('#', "").trim().to_string();
        }
        "Untitled".to_string()
    }

    /// Builds a plain-text digest from the body: metadata override first,
    /// else the first `max_len` characters with Markdown markers stripped.
    pub fn digest(&self, max_len: usize) -> String {
        if let Some(digest) = &self.meta.digest {
            return digest.clone();
        }

        let plain: String = self
            .body
            .lines()
            .filter(|line| {
                let t = line.trim();
                !t.is_empty() && !t.starts_with('#') && !t.starts_with("```")
            })
            .collect::<Vec<_>>()
            .join(" ");

        let plain = plain
            .replace("**", "")
            .replace('`', "")
            .replace('*', "");

        plain.chars().take(max_len).collect()
    }

    /// Marks the document as published and records where it landed.
    pub fn mark_published(&mut self, url: &str) {
        self.meta.published = true;
        self.meta.publish_date = Some(Local::now().format(DATE_FORMAT).to_string());
        self.meta.publish_url = Some(url.to_string());
    }
}
