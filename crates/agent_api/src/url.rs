use ::url::Url;

use crate::error::ApiError;

/// Default base URL for a locally running agent service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

const STREAM_SEGMENT: &str = "stream";

/// Normalize a base URL to the streaming endpoint.
///
/// Normalization rules:
/// 1) keep a path ending in `/stream` unchanged
/// 2) append `/stream` otherwise
pub fn normalize_stream_url(input: &str) -> Result<Url, ApiError> {
    let base = service_root(input)?;
    join_segments(&base, &[STREAM_SEGMENT])
}

/// History endpoint for one stored thread: `<service root>/threads/{id}`.
pub fn thread_url(input: &str, thread_id: &str) -> Result<Url, ApiError> {
    let trimmed = thread_id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidConfig("thread id must not be empty".to_string()));
    }

    let base = service_root(input)?;
    join_segments(&base, &["threads", trimmed])
}

/// Base URL with any trailing `/stream` segment and slashes removed.
fn service_root(input: &str) -> Result<Url, ApiError> {
    let raw = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let mut url =
        Url::parse(raw).map_err(|error| ApiError::InvalidBaseUrl(format!("{raw}: {error}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidBaseUrl(raw.to_string()));
    }

    let path = url.path().trim_end_matches('/');
    let path = path.strip_suffix("/stream").unwrap_or(path).to_string();
    url.set_path(&path);
    Ok(url)
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(base.to_string()))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}
