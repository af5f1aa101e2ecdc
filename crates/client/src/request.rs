//! Outgoing request description and its cache identity.

use bytes::Bytes;
use reqwest::{Method, Url};
use urlttl_core::Error;
use urlttl_core::cache::compute_cache_key;

use crate::fetch::canonicalize;

/// A request as seen by the cache: the attributes that define its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Url,
    body: Bytes,
}

impl Request {
    /// Build a request for `url`, canonicalizing it first.
    pub fn new(method: Method, url: &str) -> Result<Self, Error> {
        let url = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { method, url, body: Bytes::new() })
    }

    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new(Method::GET, url)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Derived cache key: identical method, URL and body give identical keys.
    pub fn cache_key(&self) -> String {
        compute_cache_key(self.method.as_str(), self.url.as_str(), &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_urls_share_key() {
        let a = Request::get("https://EXAMPLE.com/get#frag").unwrap();
        let b = Request::get("example.com/get").unwrap();
        assert_eq!(a.url().as_str(), "https://example.com/get");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_method_and_body_change_key() {
        let get = Request::get("https://example.com/").unwrap();
        let post = Request::new(Method::POST, "https://example.com/").unwrap();
        let post_body = post.clone().with_body("a=1");
        assert_ne!(get.cache_key(), post.cache_key());
        assert_ne!(post.cache_key(), post_body.cache_key());
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(Request::get("ftp://example.com"), Err(Error::InvalidUrl(_))));
    }
}
