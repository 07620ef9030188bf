//! # Route Path Syntax
//!
//! Paths are absolute and use `{name}` captures, with an optional trailing
//! `{*name}` catch-all. The legacy `:name` / `*name` segment forms are
//! refused. Two paths with the same shape (`/users/{id}` and `/users/{name}`)
//! would match the same requests, so they conflict even under different
//! methods.

/// Reason `path` is not a usable route path, if any.
pub fn check(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err("must start with '/'".to_string());
    }
    let segments: Vec<&str> = path[1..].split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(format!(
                "segment '{segment}' uses the ':name'/'*name' form; captures are written '{{name}}'"
            ));
        }
        if let Some(capture) = capture_of(segment)? {
            let name = capture.strip_prefix('*').unwrap_or(capture);
            if name.is_empty() {
                return Err(format!("segment '{segment}' has an unnamed capture"));
            }
            if capture.starts_with('*') && i != last {
                return Err(format!("catch-all '{segment}' must be the last segment"));
            }
        }
    }
    Ok(())
}

/// `path` with capture names erased. Equal shapes match the same requests.
pub fn shape(path: &str) -> String {
    path.split('/')
        .map(|segment| match capture_of(segment) {
            Ok(Some(capture)) if capture.starts_with('*') => "{*}",
            Ok(Some(_)) => "{}",
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The text inside a whole-segment `{...}` capture.
fn capture_of(segment: &str) -> Result<Option<&str>, String> {
    let opens = segment.matches('{').count();
    let closes = segment.matches('}').count();
    if opens == 0 && closes == 0 {
        return Ok(None);
    }
    match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(inner) if opens == 1 && closes == 1 => Ok(Some(inner)),
        _ => Err(format!(
            "segment '{segment}' must be a single '{{name}}' capture"
        )),
    }
}
