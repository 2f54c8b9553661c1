// SPDX-License-Identifier: MPL-2.0

//! Object storage URL helpers
//!
//! Images live in two public buckets (profiles and feeds). Rows store either
//! a full URL or a bucket-relative path such as `/profiles/<key>`; these
//! helpers turn both into the public URL served by the storage API.

/// Public URL of an object: `<base>/storage/v1/object/public/<bucket>/<key>`
pub fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim().trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}

/// Upload endpoint of an object, with each path segment percent-encoded
pub fn upload_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    match url::Url::parse(base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty();
                segments.extend(["storage", "v1", "object", bucket]);
                segments.extend(key.split('/'));
            }
            url.to_string()
        }
        Err(_) => format!("{}/storage/v1/object/{}/{}", base, bucket, key),
    }
}

/// True for `scheme://...` URLs
fn is_absolute_url(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Resolve a stored image reference for a bucket
///
/// Absolute and `data:` URLs pass through. `/<bucket>/<key>` and
/// `<bucket>/<key>` become the bucket's public URL. Anything else is returned
/// trimmed but unchanged. Blank input gives `None`.
pub fn resolve_storage_url(raw: Option<&str>, base_url: &str, bucket: &str) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_absolute_url(trimmed) || trimmed.starts_with("data:") {
        return Some(trimmed.to_string());
    }

    let prefix = format!("{}/", bucket);
    let key = trimmed
        .trim_start_matches('/')
        .strip_prefix(&prefix)
        .map(|rest| rest.trim_start_matches('/'))
        .filter(|key| !key.is_empty());

    match key {
        Some(key) if !base_url.trim().is_empty() => Some(public_object_url(base_url, bucket, key)),
        _ => Some(trimmed.to_string()),
    }
}

/// URL of a named asset inside a bucket
///
/// Without a configured base URL this is the relative `/<bucket>/<file>` path.
pub fn bucket_asset_url(base_url: &str, bucket: &str, file_name: &str) -> String {
    let file_name = file_name.trim().trim_start_matches('/');
    let prefix = format!("{}/", bucket);
    let relative = if file_name.starts_with(&prefix) {
        format!("/{}", file_name)
    } else {
        format!("/{}/{}", bucket, file_name)
    };
    resolve_storage_url(Some(&relative), base_url, bucket).unwrap_or(relative)
}
