//! Streaming download of a published file.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
};
use bytes::Bytes;
use ferry_core::{AppError, FileId};
use ferry_storage::ByteStream;
use futures::Stream;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use utoipa::IntoParams;

use super::path_file_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// RFC 5987 `attr-char` minus the unreserved marks kept as is.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Access code for protected files
    pub password: Option<String>,
}

/// Download a file
#[utoipa::path(
    get,
    path = "/api/download/{file_id}",
    tag = "files",
    params(
        ("file_id" = String, Path, description = "8-digit file ID"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Malformed file ID", body = ErrorResponse),
        (status = 401, description = "Access code missing or wrong", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 410, description = "File expired", body = ErrorResponse),
        (status = 429, description = "Too many wrong access codes", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id, operation = "download"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response<Body>, HttpAppError> {
    let file_id = path_file_id(&file_id)?;
    let grant = state
        .gate
        .authorize(&file_id, query.password.as_deref())
        .await?;
    let artifact = state.gate.open(&grant).await?;

    let body = Body::from_stream(TrackedStream {
        inner: artifact.stream,
        file_id: file_id.clone(),
        expected: artifact.size,
        sent: 0,
        finished: false,
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, artifact.size)
        .header(header::CONTENT_DISPOSITION, content_disposition(grant.file_name()))
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// `attachment` with an ASCII fallback name and the exact UTF-8 name.
pub(crate) fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(file_name, FILENAME_ENCODE_SET)
    )
}

/// Body stream that notes when a client goes away before the end.
struct TrackedStream {
    inner: ByteStream,
    file_id: FileId,
    expected: u64,
    sent: u64,
    finished: bool,
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                this.sent += bytes.len() as u64;
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(std::io::Error::other(e.to_string()))))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                file_id = %self.file_id,
                sent = self.sent,
                expected = self.expected,
                "Client disconnected during download"
            );
        }
    }
}
