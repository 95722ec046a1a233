//! URL resolution against a language variant's base URL
//!
//! Three forms are recognized:
//! - absolute (`https://other.com/x`, `mailto:a@b.c`): returned unchanged
//! - root-relative (`/contact`): resolved against scheme and host
//! - relative (`articles/foo`): resolved below the base path
//!
//! Protocol-relative URLs (`//cdn.example.com/a.png`) take the base scheme.

use url::Url;

use crate::utils::error::FetchError;

/// Resolve `target` against `base_url`
///
/// # Examples
///
/// ```
/// use kb_exporter::crawler::url::resolve_url;
///
/// let base = "https://help.example.com/en/";
/// assert_eq!(resolve_url(base, "/contact").unwrap(), "https://help.example.com/contact");
/// assert_eq!(resolve_url(base, "articles/foo").unwrap(), "https://help.example.com/en/articles/foo");
/// assert_eq!(resolve_url(base, "https://other.com/x").unwrap(), "https://other.com/x");
/// ```
///
/// # Errors
///
/// Returns `FetchError::InvalidUrl` when the base is not an absolute URL or
/// the join fails.
pub fn resolve_url(base_url: &str, target: &str) -> Result<String, FetchError> {
    let target = target.trim();
    if Url::parse(target).is_ok() {
        return Ok(target.to_string());
    }

    let base = base_directory(base_url)?;
    base.join(target)
        .map(String::from)
        .map_err(|e| FetchError::InvalidUrl(format!("{target} (base {base_url}): {e}")))
}

/// The base URL parsed as a directory, so relative paths land below it
fn base_directory(base_url: &str) -> Result<Url, FetchError> {
    let mut base = Url::parse(base_url)
        .map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Whether `url` points to another host than `base_url`
#[must_use]
pub fn is_external(base_url: &str, url: &str) -> bool {
    let Ok(target) = Url::parse(url) else {
        return false;
    };
    match Url::parse(base_url) {
        Ok(base) => base.host_str() != target.host_str(),
        Err(_) => true,
    }
}

/// Drop a trailing two-letter language segment (`https://x.io/en/` → `https://x.io/`)
#[must_use]
pub fn strip_language_segment(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if let Some((head, last)) = trimmed.rsplit_once('/') {
        let is_language = last.len() == 2 && last.chars().all(|c| c.is_ascii_alphabetic());
        if is_language && head.contains("://") {
            return format!("{head}/");
        }
    }
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
