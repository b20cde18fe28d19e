//! Session cookies exported from a logged-in browser.
//!
//! The portal only serves attachments to authenticated sessions. Cookies are
//! read from a JSON file holding either an array of `{name|key, value, domain}`
//! objects or an object with such an array under `cookies`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A cookie to replay on HTTP requests and browser pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
}

impl SessionCookie {
    /// `Set-Cookie` style header value for seeding a cookie jar.
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; Domain={}; Path={}",
            self.name,
            self.value,
            self.domain,
            self.path.as_deref().unwrap_or("/")
        )
    }

    /// URL the cookie belongs to, for cookie jars keyed by origin.
    pub fn origin_url(&self) -> Option<url::Url> {
        let host = self.domain.trim_start_matches('.');
        url::Url::parse(&format!("https://{}/", host)).ok()
    }
}

/// Parse cookies from exported JSON, skipping entries without a name or domain.
pub fn parse_cookies(json: &str) -> Result<Vec<SessionCookie>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let entries = match &value {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(obj) => obj
            .get("cookies")
            .and_then(|c| c.as_array())
            .map(|a| a.as_slice())
            .unwrap_or_default(),
        _ => &[],
    };

    let mut cookies = Vec::new();
    for cookie in entries {
        let field = |key: &str| cookie.get(key).and_then(|v| v.as_str()).unwrap_or_default();
        let name = cookie
            .get("name")
            .or_else(|| cookie.get("key"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let domain = field("domain");
        if name.is_empty() || domain.is_empty() {
            continue;
        }
        let path = Some(field("path")).filter(|p| !p.is_empty());
        cookies.push(SessionCookie {
            name: name.to_string(),
            value: field("value").to_string(),
            domain: domain.to_string(),
            path: path.map(str::to_string),
        });
    }
    Ok(cookies)
}

/// Load cookies from a file. A missing or malformed file yields no cookies.
pub fn load_cookies(path: &Path) -> Vec<SessionCookie> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not read cookies file {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match parse_cookies(&content) {
        Ok(cookies) => {
            debug!("Loaded {} cookies from {}", cookies.len(), path.display());
            cookies
        }
        Err(e) => {
            warn!("Could not parse cookies file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
