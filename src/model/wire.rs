//! Wire format of the reply endpoint
//!
//! Only the fields the pipeline consumes are declared; everything else in the
//! response is ignored by serde. Missing fields and explicit `null`s both fall
//! back to the type's default.

use serde::{Deserialize, Deserializer};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    /// Non-zero when the source rejected the request
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    #[serde(default)]
    pub data: Option<EnvelopeData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvelopeData {
    #[serde(default)]
    pub replies: Option<Vec<Reply>>,
}

/// A single reply as the source serializes it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reply {
    pub rpid: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub mid: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub root: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub parent: u64,

    /// Unix seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub ctime: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub like: u64,

    #[serde(default)]
    pub replies: Option<Vec<Reply>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub content: ReplyContent,

    #[serde(default, deserialize_with = "null_as_default")]
    pub member: Member,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uname: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub level_info: LevelInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LevelInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_level: i32,
}

/// Response of the video metadata endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    #[serde(default)]
    pub data: Option<ViewData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewData {
    /// Numeric video id; doubles as the comment subject id
    #[serde(default, deserialize_with = "null_as_default")]
    pub aid: u64,
}

impl Envelope {
    /// Consumes the envelope and returns its top-level replies
    ///
    /// `None` means the page is terminal: no `data`, no `replies`, or an
    /// empty list.
    pub fn into_replies(self) -> Option<Vec<Reply>> {
        self.data
            .and_then(|data| data.replies)
            .filter(|replies| !replies.is_empty())
    }
}
