//! HTTP handlers for manifests and segments.
//!
//! Routes (nested under `/api/stream`):
//! - `GET /{hash}/{stream}?resolution=r` manifest
//! - `GET /{hash}/{stream}/{segment}?resolution=r` segment bytes

use super::manager::SegmentRequest;
use super::stream_type::StreamType;
use crate::server::AppContext;
use axum::{
    body::Body,
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use streamforge_common::{Error, StreamingResolution};
use tokio_util::io::ReaderStream;

pub fn stream_router() -> Router<AppContext> {
    Router::new()
        .route("/:hash/:stream", get(manifest))
        .route("/:hash/:stream/:segment", get(segment))
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    resolution: Option<String>,
}

impl StreamQuery {
    fn resolution(&self) -> Result<Option<StreamingResolution>, StreamError> {
        self.resolution
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(|r| r.parse::<StreamingResolution>())
            .transpose()
            .map_err(|e| StreamError(Error::invalid_segment(e)))
    }
}

/// Maps streaming errors onto responses.
#[derive(Debug)]
pub struct StreamError(pub Error);

impl From<Error> for StreamError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidSegment(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            // The server is going away; there is nobody to explain it to.
            Error::Cancelled => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !self.0.is_client_error() {
            tracing::debug!(error = %self.0, "Stream request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}

fn parse_stream_type(name: &str) -> Result<StreamType, StreamError> {
    name.parse::<StreamType>()
        .map_err(|e| StreamError(Error::invalid_segment(e)))
}

/// Serve the HLS playlist or DASH MPD for a source.
async fn manifest(
    State(ctx): State<AppContext>,
    Path((hash, stream)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, StreamError> {
    let stream_type = parse_stream_type(&stream)?;
    let resolution = query.resolution()?;
    let source = ctx.library.source(&hash).await?;

    let manifest = ctx
        .streams
        .serve_manifest(stream_type, &source, resolution, uri.path());

    let mut response = Body::from(manifest.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(manifest.content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// Serve one segment, waiting for the transcode to produce it.
async fn segment(
    State(ctx): State<AppContext>,
    Path((hash, stream, token)): Path<(String, String, String)>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, StreamError> {
    let stream_type = parse_stream_type(&stream)?;
    let resolution = query.resolution()?;
    let source = ctx.library.source(&hash).await?;

    let served = ctx
        .streams
        .serve_segment(SegmentRequest {
            stream_type,
            source: &source,
            resolution,
            hash: &hash,
            token: &token,
        })
        .await?;

    let file = tokio::fs::File::open(&served.path)
        .await
        .map_err(|e| Error::filesystem(&served.path, e))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| Error::filesystem(&served.path, e))?
        .len();

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(served.mime_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}
