//! Lexical slash-path helpers.
//!
//! vSphere inventory paths always use `/` regardless of host platform, so
//! `std::path` is the wrong tool here. These functions never touch a live
//! inventory; they only rewrite strings.

/// Return the shortest path equivalent to `path` by purely lexical processing.
///
/// - repeated slashes collapse to one
/// - `.` segments are dropped
/// - `..` removes the preceding segment; at the root of an absolute path it
///   is dropped, in a relative path with nothing left to remove it is kept
/// - an empty result becomes `/` (absolute) or `.` (relative)
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Return everything but the last element of `path`, cleaned.
///
/// A path without any slash has `.` as its directory.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean(&path[..=idx]),
        None => ".".to_string(),
    }
}

/// Return the last element of `path`. Trailing slashes are ignored.
pub fn base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}
