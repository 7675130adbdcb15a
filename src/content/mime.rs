use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Map a file extension (without the dot) to a content type.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "opus" => "audio/opus",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "npy" => OCTET_STREAM,
        _ => return None,
    };
    Some(content_type)
}

/// Content type of a file: by extension first, then by sniffing its head.
pub fn content_type_for_path(path: &Path, head: &[u8]) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(content_type_for_extension)
        .map(str::to_string)
        .or_else(|| infer::get(head).map(|kind| kind.mime_type().to_string()))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
