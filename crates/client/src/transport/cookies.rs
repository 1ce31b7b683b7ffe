//! File-backed cookie jar shared by every exchange of a session.
//!
//! Cookies are kept per host as `name=value` pairs and rewritten to disk as
//! JSON after every response that sets one. Attributes (path, expiry,
//! secure) are not tracked.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use url::Url;

type HostCookies = BTreeMap<String, BTreeMap<String, String>>;

/// Cookie store persisted to a single file.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    cookies: Mutex<HostCookies>,
}

impl FileCookieJar {
    /// Open the jar at `path`, starting empty if it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cookies = match std::fs::read(&path) {
            Ok(data) if !data.is_empty() => serde_json::from_slice(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed cookie jar");
                HostCookies::new()
            }),
            _ => HostCookies::new(),
        };
        Self { path, cookies: Mutex::new(cookies) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of cookie `name` for `host`, if set.
    pub fn get(&self, host: &str, name: &str) -> Option<String> {
        let cookies = self.cookies.lock().ok()?;
        cookies.get(host).and_then(|c| c.get(name)).cloned()
    }

    fn persist(&self, cookies: &HostCookies) {
        let result = serde_json::to_vec_pretty(cookies)
            .map_err(std::io::Error::other)
            .and_then(|data| std::fs::write(&self.path, data));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist cookie jar");
        }
    }
}

fn parse_set_cookie(header: &HeaderValue) -> Option<(String, String)> {
    let text = header.to_str().ok()?;
    let pair = text.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

impl CookieStore for FileCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        let parsed: Vec<(String, String)> = cookie_headers.filter_map(parse_set_cookie).collect();
        if parsed.is_empty() {
            return;
        }

        let Ok(mut cookies) = self.cookies.lock() else {
            return;
        };
        cookies.entry(host.to_string()).or_default().extend(parsed);
        self.persist(&cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let cookies = self.cookies.lock().ok()?;
        let jar = cookies.get(host).filter(|c| !c.is_empty())?;

        let header = jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}
