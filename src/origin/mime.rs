//! MIME type inference

const FALLBACK: &str = "application/octet-stream";

const SUFFIXES: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".htm", "text/html"),
    (".js", "application/javascript"),
    (".mjs", "application/javascript"),
    (".css", "text/css"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
    (".webp", "image/webp"),
    (".ico", "image/x-icon"),
    (".json", "application/json"),
    (".map", "application/json"),
    (".xml", "application/xml"),
    (".pdf", "application/pdf"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    (".ttf", "font/ttf"),
    (".eot", "application/vnd.ms-fontobject"),
    (".otf", "font/otf"),
    (".wasm", "application/wasm"),
    (".mp4", "video/mp4"),
    (".webm", "video/webm"),
    (".mp3", "audio/mpeg"),
    (".wav", "audio/wav"),
    (".ogg", "audio/ogg"),
    (".txt", "text/plain"),
];

/// MIME type for a path, by suffix
pub fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    SUFFIXES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK)
}

/// Split a `Content-Type` value into MIME type and optional charset
pub fn parse_content_type(value: &str) -> (Option<String>, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());

    let charset = parts.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    });

    (mime, charset)
}
