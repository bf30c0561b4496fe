//! Data model for discussion threads
//!
//! # Components
//!
//! - `wire`: serde types mirroring the reply endpoint's JSON
//! - `Comment`: the internal comment tree the dispatcher walks
//! - `Page`: one fetched page, or the terminal marker

mod comment;
pub mod wire;

pub use comment::{flatten_replies, format_unix_time, Comment, DATE_FORMAT};

/// Payload of a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Top-level comments of this page, in source order
    Replies(Vec<Comment>),

    /// No data at this index or any later one
    Empty,
}

impl Page {
    /// Builds a page from a decoded envelope
    pub fn from_envelope(envelope: wire::Envelope) -> Self {
        match envelope.into_replies() {
            Some(replies) => Page::Replies(flatten_replies(replies)),
            None => Page::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Page::Empty)
    }

    /// Total number of comments on this page at any depth
    pub fn comment_count(&self) -> usize {
        match self {
            Page::Replies(comments) => comments.iter().map(Comment::subtree_size).sum(),
            Page::Empty => 0,
        }
    }
}
