use crate::UrlError;
use url::Url;

/// Query parameters that only carry tracking or navigation state
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ctaref",
];

/// Parses an absolute http(s) URL
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::parse_absolute;
///
/// assert!(parse_absolute("https://www.shop.example/women").is_ok());
/// assert!(parse_absolute("/women").is_err());
/// assert!(parse_absolute("mailto:help@shop.example").is_err());
/// ```
pub fn parse_absolute(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Resolves a link found on a page into its canonical absolute form
///
/// # Canonicalization Steps
///
/// 1. Skip empty, fragment-only, `javascript:`, `mailto:`, `tel:` and
///    `data:` hrefs
/// 2. Resolve against the page URL
/// 3. Reject anything that is not http(s)
/// 4. Drop the fragment (storefront navigation appends `#nlid=...`)
/// 5. Drop tracking query parameters, keeping the order of the rest
///
/// Returns `None` when the link should be ignored.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::canonicalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://www.shop.example/").unwrap();
/// let url = canonicalize_link("/women/dresses/cat/?cid=8799#nlid=ww|clothing", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.shop.example/women/dresses/cat/?cid=8799");
/// ```
pub fn canonicalize_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    strip_tracking_params(&mut url);

    Some(url)
}

/// Returns a copy of `url` with query parameter `key` set to `value`
///
/// An existing parameter with the same key is replaced in place; other
/// parameters keep their order.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::with_query_param;
/// use url::Url;
///
/// let url = Url::parse("https://www.shop.example/men/cat/?cid=4209").unwrap();
/// let page = with_query_param(&url, "page", "3");
/// assert_eq!(page.as_str(), "https://www.shop.example/men/cat/?cid=4209&page=3");
/// ```
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match params.iter_mut().find(|(k, _)| k == key) {
        Some(existing) => existing.1 = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }

    let mut result = url.clone();
    result.query_pairs_mut().clear().extend_pairs(params);
    result
}

/// Removes tracking parameters, dropping the query entirely if nothing remains
fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != url.query_pairs().count() {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
