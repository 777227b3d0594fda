//! Page identity and restricted-page detection.

use shared::domain::PageKey;
use url::Url;

const STORE_PAGES: &[(&str, &str)] = &[
    ("chromewebstore.google.com", "/"),
    ("chrome.google.com", "/webstore"),
    ("microsoftedge.microsoft.com", "/addons"),
    ("addons.mozilla.org", "/"),
];

/// True for pages the extension may not script: browser-internal schemes,
/// anything that is not http(s), and the extension stores.
pub fn is_restricted_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return true;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return true;
    }
    let Some(host) = url.host_str() else {
        return true;
    };
    STORE_PAGES
        .iter()
        .any(|(store_host, prefix)| host == *store_host && url.path().starts_with(prefix))
}

/// Page key for a scriptable page, `None` for restricted ones.
pub fn page_key_for(raw: &str) -> Option<PageKey> {
    if is_restricted_url(raw) {
        return None;
    }
    PageKey::from_url(raw)
}
