//! Data models
//!
//! This module contains the data structures shared across the pipeline:
//! - the persisted article document (metadata block + Markdown body)
//! - helpers for deriving a title and digest from the body

mod article;

pub use article::{ArticleDocument, ArticleMeta, CoverImageRef, DocumentError, DATE_FORMAT};
