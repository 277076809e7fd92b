use std::fmt;

use crate::error::CrawlError;

/// Where to crawl and as whom.
///
/// All fields are trimmed of surrounding whitespace on construction.
#[derive(Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Remote directory the walk starts from.
    pub root: String,
}

impl CrawlTarget {
    pub fn new(
        host: impl AsRef<str>,
        user: impl AsRef<str>,
        password: impl AsRef<str>,
        root: impl AsRef<str>,
    ) -> Self {
        Self {
            host: host.as_ref().trim().to_string(),
            user: user.as_ref().trim().to_string(),
            password: password.as_ref().trim().to_string(),
            root: root.as_ref().trim().to_string(),
        }
    }

    /// `host:port`, using `default_port` unless the host already names one.
    pub fn address(&self, default_port: u16) -> String {
        if has_port(&self.host) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, default_port)
        }
    }
}

// A bare IPv6 literal contains colons but no port; only `[..]:port` does.
fn has_port(host: &str) -> bool {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.contains("]:");
    }
    match host.rsplit_once(':') {
        Some((name, port)) => !name.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

impl fmt::Debug for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("root", &self.root)
            .finish()
    }
}

/// A complete crawl request: target plus the raw comma-separated terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub target: CrawlTarget,
    pub terms: String,
}

impl CrawlRequest {
    pub fn new(
        host: impl AsRef<str>,
        user: impl AsRef<str>,
        password: impl AsRef<str>,
        root: impl AsRef<str>,
        terms: impl AsRef<str>,
    ) -> Self {
        Self {
            target: CrawlTarget::new(host, user, password, root),
            terms: terms.as_ref().trim().to_string(),
        }
    }

    /// Reject blank fields and empty terms.
    ///
    /// The engine itself accepts empty alternatives (they match everywhere);
    /// front-ends call this before starting a job.
    pub fn validate(&self) -> Result<(), CrawlError> {
        let t = &self.target;
        for (value, name) in [
            (&t.host, "host"),
            (&t.user, "user"),
            (&t.password, "password"),
            (&t.root, "path"),
        ] {
            if value.is_empty() {
                return Err(CrawlError::MissingField(name));
            }
        }
        if self.terms.is_empty() {
            return Err(CrawlError::EmptyTerms);
        }
        if let Some(pos) = self.terms.split(',').position(|t| t.trim().is_empty()) {
            return Err(CrawlError::EmptyTerm(pos));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_trimmed() {
        let req = CrawlRequest::new(" ftp.example.com ", " bob\t", " pw ", " /www ", " foo, bar ");
        assert_eq!(req.target.host, "ftp.example.com");
        assert_eq!(req.target.user, "bob");
        assert_eq!(req.target.password, "pw");
        assert_eq!(req.target.root, "/www");
        assert_eq!(req.terms, "foo, bar");
    }

    #[test]
    fn default_port_is_appended_once() {
        let t = CrawlTarget::new("ftp.example.com", "u", "p", "/");
        assert_eq!(t.address(21), "ftp.example.com:21");
        let t = CrawlTarget::new("ftp.example.com:2121", "u", "p", "/");
        assert_eq!(t.address(21), "ftp.example.com:2121");
        let t = CrawlTarget::new("[::1]:2121", "u", "p", "/");
        assert_eq!(t.address(21), "[::1]:2121");
    }

    #[test]
    fn validate_rejects_blank_input() {
        let req = CrawlRequest::new("h", "u", "p", "/", "foo");
        assert!(req.validate().is_ok());

        let req = CrawlRequest::new("h", " ", "p", "/", "foo");
        assert!(matches!(req.validate(), Err(CrawlError::MissingField("user"))));

        let req = CrawlRequest::new("h", "u", "p", "/", "   ");
        assert!(matches!(req.validate(), Err(CrawlError::EmptyTerms)));

        let req = CrawlRequest::new("h", "u", "p", "/", "foo,, bar");
        assert!(matches!(req.validate(), Err(CrawlError::EmptyTerm(1))));
    }

    #[test]
    fn debug_redacts_password() {
        let t = CrawlTarget::new("h", "u", "hunter2", "/");
        assert!(!format!("{t:?}").contains("hunter2"));
    }
}
