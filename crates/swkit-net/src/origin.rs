//! Origin comparisons.

use url::Url;

/// Whether two URLs share scheme, host and port.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Whether `url` is an `https` URL on an origin other than `app_origin`.
///
/// Third-party CDN scripts, fonts and styles fall in this bucket.
pub fn is_cross_origin(url: &Url, app_origin: &Url) -> bool {
    url.scheme() == "https" && !is_same_origin(url, app_origin)
}
