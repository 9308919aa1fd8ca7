//! Request body classification for access logging.
//!
//! [`capture`] turns a request body into a [`serde_json::Value`] suitable for
//! a log record and hands back a request whose body yields exactly the
//! original bytes. Classification never fails: malformed or oversized bodies
//! degrade to placeholder values.
//!
//! # Classification Rules
//!
//! | Content type          | Result                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `multipart/form-data` | text fields plus `is_file_uploads`, or a parse error |
//! | anything else         | decoded JSON, or `{}` when empty or not JSON        |

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::header::CONTENT_TYPE;
use futures_util::{StreamExt, stream};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tracing::debug;

/// Placeholder message for multipart bodies that cannot be classified.
pub const MULTIPART_PARSE_ERROR: &str = "failed to parse multipart form";

/// Key added to classified multipart bodies.
pub const FILE_UPLOADS_KEY: &str = "is_file_uploads";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Upper bounds on how much of a body is buffered for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    /// Largest multipart body that is parsed.
    pub max_multipart_bytes: usize,
    /// Largest non-multipart body that is decoded as JSON.
    pub max_capture_bytes: usize,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn multipart_error() -> Value {
    json!({ "error": MULTIPART_PARSE_ERROR })
}

/// Classifies the body of `req` and returns the request with a body that
/// replays the original bytes.
///
/// Bodies over the applicable limit are not classified; the bytes read so
/// far are chained in front of the unread remainder so the downstream
/// handler still sees the full stream.
pub async fn capture(req: Request, limits: BodyLimits) -> (Request, Value) {
    let (parts, body) = req.into_parts();
    let content_type = parts.headers.get(CONTENT_TYPE).cloned();
    let is_multipart = content_type
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with(MULTIPART_FORM_DATA));

    let limit = if is_multipart {
        limits.max_multipart_bytes
    } else {
        limits.max_capture_bytes
    };

    let (body, captured) = match buffer(body, limit).await {
        Buffered::Complete(bytes) => {
            let captured = match content_type {
                Some(content_type) if is_multipart => {
                    classify_multipart(&content_type, bytes.clone()).await
                }
                _ => classify_json(&bytes),
            };
            (Body::from(bytes), captured)
        }
        Buffered::Partial(body) => {
            debug!(limit, "Request body exceeds capture limit");
            let captured = if is_multipart {
                multipart_error()
            } else {
                empty_object()
            };
            (body, captured)
        }
    };

    (Request::from_parts(parts, body), captured)
}

enum Buffered {
    /// The whole body, within the limit.
    Complete(Bytes),
    /// The limit was exceeded or the stream failed; the body replays what
    /// was read followed by the rest of the original stream.
    Partial(Body),
}

async fn buffer(body: Body, limit: usize) -> Buffered {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                buf.extend_from_slice(&chunk);
                if buf.len() > limit {
                    let head = stream::iter([Ok::<_, axum::Error>(Bytes::from(buf))]);
                    return Buffered::Partial(Body::from_stream(head.chain(stream)));
                }
            }
            Err(err) => {
                let replay = stream::iter([Ok(Bytes::from(buf)), Err(err)]);
                return Buffered::Partial(Body::from_stream(replay));
            }
        }
    }

    Buffered::Complete(Bytes::from(buf))
}

fn classify_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return empty_object();
    }

    serde_json::from_slice(bytes).unwrap_or_else(|_| empty_object())
}

async fn classify_multipart(content_type: &HeaderValue, bytes: Bytes) -> Value {
    match collect_form(content_type, bytes).await {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Multipart body classification failed");
            multipart_error()
        }
    }
}

/// Collects text fields; a field repeated under one name becomes an array
/// in submission order. Unnamed text parts are dropped.
async fn collect_form(content_type: &HeaderValue, bytes: Bytes) -> Result<Value, multer::Error> {
    let content_type = content_type.to_str().map_err(|_| multer::Error::NoBoundary)?;
    let boundary = multer::parse_boundary(content_type)?;
    let source = stream::once(async move { Ok::<_, Infallible>(bytes) });
    let mut multipart = multer::Multipart::new(source, boundary);

    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut has_file_uploads = false;

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            has_file_uploads = true;
            continue;
        }

        let Some(name) = field.name().filter(|name| !name.is_empty()) else {
            continue;
        };
        let name = name.to_string();
        let text = field.text().await?;
        fields.entry(name).or_default().push(text);
    }

    let mut value = Map::new();
    for (name, mut values) in fields {
        let entry = if values.len() == 1 {
            Value::String(values.remove(0))
        } else {
            Value::Array(values.into_iter().map(Value::String).collect())
        };
        value.insert(name, entry);
    }
    value.insert(FILE_UPLOADS_KEY.to_string(), Value::Bool(has_file_uploads));

    Ok(Value::Object(value))
}
