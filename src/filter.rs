use ignore::overrides::{Override, OverrideBuilder};

use crate::entry::{EntryKind, RemoteEntry};
use crate::error::CrawlError;
use crate::traits::Matcher;

/// Extensions crawled when nothing else is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".php", ".js"];

/// Accepts files whose name ends in one of a set of extensions.
///
/// Extensions may be given as `.php`, `php` or `*.php`. Matching is
/// case-sensitive and looks at the file name only.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    overrides: Override,
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Result<Self, CrawlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = OverrideBuilder::new("/");
        let mut normalized = Vec::new();

        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('*');
            if ext.is_empty() || ext == "." {
                continue;
            }
            let ext = if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{ext}")
            };
            builder
                .add(&format!("*{ext}"))
                .map_err(|e| CrawlError::InvalidFilter(e.to_string()))?;
            normalized.push(ext);
        }

        if normalized.is_empty() {
            return Err(CrawlError::InvalidFilter("no file extensions given".into()));
        }

        let overrides = builder
            .build()
            .map_err(|e| CrawlError::InvalidFilter(e.to_string()))?;

        Ok(Self { overrides, extensions: normalized })
    }

    /// The normalized extensions, each with a leading dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Matcher for ExtensionFilter {
    fn is_match(&self, entry: &RemoteEntry) -> bool {
        matches!(entry.kind, EntryKind::File | EntryKind::Symlink)
            && self.overrides.matched(&entry.name, false).is_whitelist()
    }
}

/// Accepts every file. Used when no filter is given to the builder.
pub(crate) struct AllFiles;

impl Matcher for AllFiles {
    fn is_match(&self, entry: &RemoteEntry) -> bool {
        matches!(entry.kind, EntryKind::File | EntryKind::Symlink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ExtensionFilter {
        ExtensionFilter::new(DEFAULT_EXTENSIONS).unwrap()
    }

    fn file(name: &str) -> RemoteEntry {
        RemoteEntry::listed(name, EntryKind::File, None)
    }

    #[test]
    fn default_accepts_php_and_js() {
        let f = defaults();
        assert!(f.is_match(&file("index.php")));
        assert!(f.is_match(&file("app.min.js")));
        assert!(!f.is_match(&file("style.css")));
        assert!(!f.is_match(&file("php")));
        assert!(!f.is_match(&file("notes.php.bak")));
    }

    #[test]
    fn directories_never_match() {
        let f = defaults();
        let dir = RemoteEntry::listed("vendor.php", EntryKind::Dir, None);
        assert!(!f.is_match(&dir));
    }

    #[test]
    fn extension_forms_are_normalized() {
        let f = ExtensionFilter::new(["inc", "*.tpl", " .phtml "]).unwrap();
        assert_eq!(f.extensions(), &[".inc", ".tpl", ".phtml"]);
        assert!(f.is_match(&file("header.inc")));
        assert!(f.is_match(&file("page.tpl")));
        assert!(f.is_match(&file("view.phtml")));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let f = defaults();
        assert!(!f.is_match(&file("INDEX.PHP")));
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = ExtensionFilter::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CrawlError::InvalidFilter(_)));
        assert!(ExtensionFilter::new(["", " * "]).is_err());
    }
}
