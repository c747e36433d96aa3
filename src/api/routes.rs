use crate::AppState;
use crate::policy::{Policy, classify, generate_target, object_key};
use crate::signing::{VERIFY_PARAM, unix_now};
use crate::storage::ObjectMeta;
use axum::body::Body;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode, Uri, header};
use mime_guess::from_path;
use tracing::{debug, error, warn};

/// Entry point for every GET request.
///
/// The path decides what happens next: public objects are served directly,
/// `/generate/...` mints a signed URL, protected objects are verified before
/// storage is touched, and anything else is refused.
pub async fn handle_request(
    Extension(state): Extension<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response<Body> {
    let path = uri.path();

    match classify(path) {
        Policy::Public => serve_object(&state, path, Policy::Public, &headers).await,
        Policy::Generate => generate_url(&state, path),
        Policy::Protected => {
            let raw = verify_param(&uri);
            if let Err(error) = state.signer.verify(path, raw.as_deref(), unix_now()) {
                warn!(%path, %error, "Signed URL rejected");
                return err_response(error.to_err_code(), error.public_reason());
            }
            serve_object(&state, path, Policy::Protected, &headers).await
        }
        Policy::Denied => {
            debug!(%path, "No policy matches path");
            err_response(StatusCode::FORBIDDEN, "Access denied")
        }
    }
}

/// First `verify` value of the query string.
///
/// A form decoder turns a literal `+` into a space; standard base64 never
/// contains spaces, so they are mapped back.
fn verify_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == VERIFY_PARAM)
        .map(|(_, value)| value.replace(' ', "+"))
}

fn generate_url(state: &AppState, path: &str) -> Response<Body> {
    match state.signer.issue(generate_target(path)) {
        Ok(signed) => {
            let mut res = Response::new(Body::from(signed.to_string()));
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            res
        }
        Err(error) => {
            warn!(%path, %error, "Refused to sign URL");
            err_response(StatusCode::BAD_REQUEST, error.to_string())
        }
    }
}

/// Parse a single `Range: bytes=...` header against an object of `size` bytes.
///
/// Returns the inclusive range to serve, or `None` to serve the whole object.
fn parse_range(headers: &HeaderMap, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }

    let ranges = headers
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let last = size - 1;

    match (start.trim(), end.trim()) {
        // bytes=-N: the final N bytes
        ("", suffix) => {
            let suffix = suffix.parse::<u64>().ok().filter(|n| *n > 0)?;
            Some((size.saturating_sub(suffix), last))
        }
        (start, "") => {
            let start = start.parse::<u64>().ok().filter(|s| *s <= last)?;
            Some((start, last))
        }
        (start, end) => {
            let start = start.parse::<u64>().ok().filter(|s| *s <= last)?;
            let end = end.parse::<u64>().ok().filter(|e| *e >= start)?;
            Some((start, end.min(last)))
        }
    }
}

async fn serve_object(
    state: &AppState,
    path: &str,
    policy: Policy,
    headers: &HeaderMap,
) -> Response<Body> {
    let key = object_key(path);

    let meta = match state.storage_manager.stat(key).await {
        Ok(Some(meta)) => meta,
        Ok(None) => return file_not_found(),
        Err(error) => {
            error!(%key, ?error, "Failed to stat object");
            return storage_error();
        }
    };

    let range = parse_range(headers, meta.size);
    let (status, start, end) = match range {
        Some((start, end)) => (StatusCode::PARTIAL_CONTENT, start, end),
        None => (StatusCode::OK, 0, meta.size.saturating_sub(1)),
    };

    let (body, len) = if meta.size == 0 {
        (Body::empty(), 0)
    } else {
        match state.storage_manager.read_range(key, start, end).await {
            Ok(stream) => (Body::from_stream(stream), end - start + 1),
            Err(error) => {
                if error
                    .downcast_ref::<opendal::Error>()
                    .is_some_and(|error| error.kind() == opendal::ErrorKind::NotFound)
                {
                    return file_not_found();
                }
                error!(%key, ?error, "Failed to read object");
                return storage_error();
            }
        }
    };

    debug!(%key, ?policy, %status, len, "Serving object");

    let mut res = Response::new(body);
    *res.status_mut() = status;
    apply_object_headers(res.headers_mut(), key, &meta, policy);
    res.headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if status == StatusCode::PARTIAL_CONTENT {
        let content_range = format!("bytes {start}-{end}/{}", meta.size);
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            res.headers_mut().insert(header::CONTENT_RANGE, value);
        }
    }
    res
}

fn apply_object_headers(headers: &mut HeaderMap, key: &str, meta: &ObjectMeta, policy: Policy) {
    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .or_else(|| HeaderValue::from_str(from_path(key).first_or_octet_stream().as_ref()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Some(cache_control) = policy.cache_control() {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }
    if let Some(etag) = meta
        .etag
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
    {
        headers.insert(header::ETAG, etag);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}

fn file_not_found() -> Response<Body> {
    err_response(StatusCode::NOT_FOUND, "File not found")
}

fn storage_error() -> Response<Body> {
    err_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
}

pub(crate) fn err_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}
