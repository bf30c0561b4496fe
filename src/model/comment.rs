use crate::model::wire::Reply;
use chrono::{DateTime, Local};

/// Layout used for the stored `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A comment together with its nested replies
///
/// Rebuilt from the wire payload on every fetch and dropped once dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Globally unique comment id
    pub id: u64,

    /// Id of the top-level comment of this thread (0 for top-level comments)
    pub root: u64,

    /// Id of the comment this one replies to (0 for top-level comments)
    pub parent: u64,

    /// Creation time as local `YYYY-MM-DD HH:MM:SS`
    pub time: String,

    pub like: u64,

    /// Raw message text, not yet codec-encoded
    pub message: String,

    /// Direct replies, in source order
    pub replies: Vec<Comment>,

    pub user_id: u64,
    pub user_name: String,
    pub user_level: i32,
}

impl Comment {
    /// Number of comments in this subtree, including `self`
    pub fn subtree_size(&self) -> usize {
        1 + self.replies.iter().map(Comment::subtree_size).sum::<usize>()
    }
}

impl From<Reply> for Comment {
    fn from(reply: Reply) -> Self {
        Self {
            id: reply.rpid,
            root: reply.root,
            parent: reply.parent,
            time: format_unix_time(reply.ctime),
            like: reply.like,
            message: reply.content.message,
            replies: flatten_replies(reply.replies.unwrap_or_default()),
            user_id: reply.mid,
            user_name: reply.member.uname,
            user_level: reply.member.level_info.current_level,
        }
    }
}

/// Maps a list of wire replies onto comments, keeping order and nesting
pub fn flatten_replies(replies: Vec<Reply>) -> Vec<Comment> {
    replies.into_iter().map(Comment::from).collect()
}

/// Formats unix seconds in the local timezone
///
/// Timestamps chrono cannot represent come back as an empty string.
pub fn format_unix_time(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.with_timezone(&Local).format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}
