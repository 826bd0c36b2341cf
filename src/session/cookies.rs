//! Cookie plumbing between the incoming request and the outgoing response.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use cookie::time::Duration;
use cookie::Cookie;

/// Ordered cookies as seen on a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCookieSet {
    entries: Vec<Cookie<'static>>,
}

impl SessionCookieSet {
    /// Parse every `Cookie` header. Unparseable pairs are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let entries = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value.to_string()))
            .filter_map(Result::ok)
            .map(Cookie::into_owned)
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.entries.iter().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the cookie with the same name in place, or append it.
    pub fn set(&mut self, cookie: Cookie<'static>) {
        match self.entries.iter_mut().find(|c| c.name() == cookie.name()) {
            Some(existing) => *existing = cookie,
            None => self.entries.push(cookie),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|c| c.name() != name);
    }

    /// Render as a single `Cookie` request header value (name=value pairs only).
    pub fn to_header_value(&self) -> Option<HeaderValue> {
        if self.entries.is_empty() {
            return None;
        }
        let joined = self
            .entries
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

/// Read/write adapter handed to the session provider.
///
/// Reads come from the request view. Writes land on both the request view
/// (so the upstream sees fresh values) and the `Set-Cookie` list.
#[derive(Debug, Clone, Default)]
pub struct CookieBridge {
    request: SessionCookieSet,
    response: Vec<Cookie<'static>>,
}

impl CookieBridge {
    pub fn new(request: SessionCookieSet) -> Self {
        Self {
            request,
            response: Vec::new(),
        }
    }

    pub fn get_all(&self) -> &SessionCookieSet {
        &self.request
    }

    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.request.get(name)
    }

    pub fn set_all<I>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        for cookie in cookies {
            if is_removal(&cookie) {
                self.request.remove(cookie.name());
            } else {
                self.request.set(cookie.clone());
            }
            match self.response.iter_mut().find(|c| c.name() == cookie.name()) {
                Some(existing) => *existing = cookie,
                None => self.response.push(cookie),
            }
        }
    }

    /// Stage a removal of `name`.
    pub fn remove(&mut self, name: &str) {
        let cookie = Cookie::build((name.to_string(), String::new()))
            .path("/")
            .max_age(Duration::ZERO)
            .build();
        self.set_all([cookie]);
    }

    /// Whether any write was staged.
    pub fn is_dirty(&self) -> bool {
        !self.response.is_empty()
    }

    pub fn request_view(&self) -> &SessionCookieSet {
        &self.request
    }

    pub fn response_cookies(&self) -> &[Cookie<'static>] {
        &self.response
    }

    /// Append one `Set-Cookie` header per staged write.
    pub fn apply_to_response(&self, headers: &mut HeaderMap) {
        for cookie in &self.response {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(_) => tracing::warn!(cookie = cookie.name(), "Dropping unencodable cookie"),
            }
        }
    }
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.max_age().is_some_and(|age| age <= Duration::ZERO)
}
