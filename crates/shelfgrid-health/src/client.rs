//! Minimal HTTP/1.1 client helpers.
//!
//! Bare-handshake hyper client over a plain TCP connection, bounded by
//! a caller-supplied timeout. Enough for health probes, metrics
//! queries, and webhook posts; not a general-purpose client.

use std::time::Duration;

use http_body_util::BodyExt;
use tracing::debug;

use shelfgrid_types::CollaboratorError;

/// Split an `http://` URL into (authority, path).
///
/// A missing port defaults to 80; a missing path becomes `/`.
pub fn split_url(url: &str) -> Result<(String, String), CollaboratorError> {
    let rest = url.strip_prefix("http://").ok_or_else(|| {
        CollaboratorError::unavailable(format!("unsupported URL (http:// only): {url}"))
    })?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return Err(CollaboratorError::unavailable(format!("empty host in URL: {url}")));
    }

    let authority = if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{authority}:80")
    };
    Ok((authority, path.to_string()))
}

/// Perform a GET and return (status, body). Transport failures and the
/// timeout both surface as [`CollaboratorError`].
pub async fn get(url: &str, timeout: Duration) -> Result<(u16, bytes::Bytes), CollaboratorError> {
    request(url, "GET", None, timeout).await
}

/// POST a JSON body and return the response status.
pub async fn post_json(
    url: &str,
    body: Vec<u8>,
    timeout: Duration,
) -> Result<u16, CollaboratorError> {
    let (status, _) = request(url, "POST", Some(body), timeout).await?;
    Ok(status)
}

async fn request(
    url: &str,
    method: &str,
    body: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<(u16, bytes::Bytes), CollaboratorError> {
    let (authority, path) = split_url(url)?;

    let fut = async {
        let stream = tokio::net::TcpStream::connect(&authority)
            .await
            .map_err(|e| {
                debug!(error = %e, %url, "connect failed");
                CollaboratorError::unavailable(format!("connect {authority}: {e}"))
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| {
                debug!(error = %e, %url, "handshake failed");
                CollaboratorError::unavailable(format!("handshake {authority}: {e}"))
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = http::Request::builder()
            .method(method)
            .uri(format!("http://{authority}{path}"))
            .header("host", &authority)
            .header("user-agent", "shelfgrid/0.1");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(http_body_util::Full::new(bytes::Bytes::from(
                body.unwrap_or_default(),
            )))
            .map_err(CollaboratorError::unavailable)?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("request {url}: {e}")))?;

        let status = resp.status().as_u16();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("body {url}: {e}")))?
            .to_bytes();
        Ok((status, bytes))
    };

    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%url, timeout_ms = timeout.as_millis() as u64, "request timed out");
            Err(CollaboratorError::Timeout(timeout.as_millis() as u64))
        }
    }
}
