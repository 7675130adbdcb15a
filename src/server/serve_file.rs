//! File streaming with single byte-range support

use axum::{
    body::Body,
    extract::OptionalFromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::content::ContentFile;

const HEADER_BYTE_RANGE: &str = "Range";
const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let (start, end) = v.split_once('-')?;
        if end.contains('-') {
            return None;
        }

        Some(ByteRange {
            start_inclusive: start.trim().parse::<u64>().ok(),
            end_inclusive: end.trim().parse::<u64>().ok(),
        })
    }

    /// Inclusive `(first, last)` offsets inside a file of `file_length`
    /// bytes. `None` when the range cannot be satisfied.
    fn resolve(&self, file_length: u64) -> Option<(u64, u64)> {
        if file_length == 0 {
            return None;
        }
        let last_byte = file_length - 1;
        match (self.start_inclusive, self.end_inclusive) {
            (None, None) => Some((0, last_byte)),
            // Suffix form: the final `n` bytes.
            (None, Some(0)) => None,
            (None, Some(n)) => Some((file_length - n.min(file_length), last_byte)),
            (Some(start), _) if start > last_byte => None,
            (Some(start), None) => Some((start, last_byte)),
            (Some(start), Some(end)) if end < start => None,
            (Some(start), Some(end)) => Some((start, end.min(last_byte))),
        }
    }

    fn is_whole(&self) -> bool {
        self.start_inclusive.is_none() && self.end_inclusive.is_none()
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for ByteRange {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

fn range_not_satisfiable(file_length: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{}", file_length))],
    )
        .into_response()
}

/// Stream `file` back, honouring an optional byte range.
pub async fn serve_file(file: &ContentFile, byte_range: Option<ByteRange>) -> Response {
    debug!("Serving {} ({})", file.path.display(), file.content_type);

    let mut handle = match File::open(&file.path).await {
        Ok(x) => x,
        Err(err) => {
            error!("Failed to open {}: {}", file.path.display(), err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let file_length = match handle.metadata().await {
        Ok(x) => x.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let partial = byte_range.filter(|r| !r.is_whole());
    let (status_code, start, chunk_size) = match partial {
        None => (StatusCode::OK, 0, file_length),
        Some(range) => match range.resolve(file_length) {
            Some((first, last)) => (StatusCode::PARTIAL_CONTENT, first, last - first + 1),
            None => return range_not_satisfiable(file_length),
        },
    };

    if start > 0 && handle.seek(SeekFrom::Start(start)).await.is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, handle.take(chunk_size));
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    let mut builder = Response::builder()
        .status(status_code)
        .header(header::CONTENT_TYPE, file.content_type.as_str())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, chunk_size);
    if status_code == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, start + chunk_size - 1, file_length),
        );
    }

    match builder.body(Body::from_stream(stream)) {
        Ok(response) => response,
        Err(err) => {
            error!("Failed to build file response: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
