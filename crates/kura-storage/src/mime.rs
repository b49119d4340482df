use std::path::Path;

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// Explicit table first so media playback gets the types SDK clients expect,
// regardless of what the guessing library ships.
const MIME_TABLE: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
];

pub(crate) fn content_type_for(key: &str) -> String {
    let ext = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    if let Some(ext) = ext {
        if let Some((_, content_type)) = MIME_TABLE.iter().find(|(entry, _)| *entry == ext) {
            return (*content_type).to_string();
        }
    }

    mime_guess::from_path(key)
        .first_raw()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
