//! Subject resolution
//!
//! A thread is addressed by a numeric subject id. Configurations may name a
//! video by its `bvid` instead; that id is looked up once, before discovery.

use crate::config::SourceConfig;
use crate::ingest::fetcher::get_text;
use crate::model::wire::ViewEnvelope;
use crate::{ConfigError, HarvestError};
use reqwest::Client;

/// Returns the numeric subject id for `source`
///
/// A configured `subject-id` is returned as-is; otherwise the `bvid` is
/// resolved through the view endpoint.
pub async fn resolve_subject(client: &Client, source: &SourceConfig) -> Result<u64, HarvestError> {
    if let Some(subject_id) = source.subject_id {
        return Ok(subject_id);
    }

    match &source.bvid {
        Some(bvid) => resolve_bvid(client, &source.view_endpoint(), bvid).await,
        None => Err(ConfigError::Validation("one of subject_id or bvid is required".to_string()).into()),
    }
}

/// Looks up the numeric id of video `bvid`
pub async fn resolve_bvid(
    client: &Client,
    view_endpoint: &str,
    bvid: &str,
) -> Result<u64, HarvestError> {
    let url = format!("{}{}", view_endpoint, bvid);
    tracing::debug!("Resolving {} via {}", bvid, url);

    let body = get_text(client, &url).await?;
    let subject_id = decode_view(&url, &body)?;

    tracing::info!("Resolved {} to subject {}", bvid, subject_id);
    Ok(subject_id)
}

/// Extracts the subject id from a view response body
pub fn decode_view(url: &str, body: &str) -> Result<u64, HarvestError> {
    let envelope: ViewEnvelope =
        serde_json::from_str(body).map_err(|source| HarvestError::Decode {
            url: url.to_string(),
            source,
        })?;

    if envelope.code != 0 {
        return Err(HarvestError::Api {
            url: url.to_string(),
            code: envelope.code,
            message: envelope.message,
        });
    }

    match envelope.data.map(|data| data.aid) {
        Some(aid) if aid > 0 => Ok(aid),
        _ => Err(HarvestError::Api {
            url: url.to_string(),
            code: envelope.code,
            message: "response carried no video id".to_string(),
        }),
    }
}
