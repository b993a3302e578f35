use url::Url;

/// Extracts the site host from a URL
///
/// The host is lowercased and a leading `www.` is removed, so that
/// `https://www.shop.example` and `https://shop.example` name the same site.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catalog_harvest::url::site_host;
///
/// let url = Url::parse("https://WWW.Shop.Example/women").unwrap();
/// assert_eq!(site_host(&url), Some("shop.example".to_string()));
/// ```
pub fn site_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => host,
        }
    })
}

/// Returns true when both URLs belong to the same site (host and port)
pub fn same_site(url: &Url, base: &Url) -> bool {
    match (site_host(url), site_host(base)) {
        (Some(a), Some(b)) => a == b && url.port_or_known_default() == base.port_or_known_default(),
        _ => false,
    }
}
