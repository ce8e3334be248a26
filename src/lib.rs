//! inkpress - Automated article pipeline for WeChat Official Accounts
//!
//! This library turns Markdown article documents into inline-styled HTML
//! and publishes them through the Official Account draft/freepublish API:
//! generate (or load) an article body, rewrite fenced code blocks into
//! rendered images, style the Markdown with a theme, upload the cover and
//! inline images, create a draft, submit it and poll the publish status
//! until a terminal state is observed.

pub mod config;
pub mod models;
pub mod services;
pub mod theme;
pub mod wechat;
