use md5::{Digest, Md5};

use super::target::ClientFormat;

/// A rendered subscription document ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub format: ClientFormat,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Extra response headers, in emission order
    pub headers: Vec<(String, String)>,
}

impl RenderedOutput {
    pub fn new(format: ClientFormat, body: Vec<u8>) -> Self {
        RenderedOutput {
            format,
            body,
            content_type: format.content_type(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as text; every renderer emits UTF-8.
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    /// Hex MD5 of the body, usable as an entity tag or cache key component.
    pub fn etag(&self) -> String {
        let digest = Md5::digest(&self.body);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let output = RenderedOutput::new(ClientFormat::Clash, b"proxies: []".to_vec())
            .with_header("subscription-userinfo", "upload=0");
        assert_eq!(output.header("Subscription-Userinfo"), Some("upload=0"));
        assert_eq!(output.content_type, "text/yaml; charset=utf-8");
    }

    #[test]
    fn test_etag_is_stable() {
        let a = RenderedOutput::new(ClientFormat::Generic, Vec::new());
        let b = RenderedOutput::new(ClientFormat::Generic, Vec::new());
        assert_eq!(a.etag(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(a.etag(), b.etag());
    }
}
