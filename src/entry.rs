/// A single item listed by a [`RemoteSession`](crate::traits::RemoteSession).
///
/// `path` is the full remote path, built by joining the listed directory
/// with `name`. Sessions only fill `name`, `kind` and `size`; the walker
/// assigns `path` and `depth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Full remote path to the entry.
    pub path: String,

    /// The entry's name as listed by the server.
    pub name: String,

    /// What kind of entry this is.
    pub kind: EntryKind,

    /// How deep below the crawl root this entry was found. Root children = 1.
    pub depth: usize,

    /// Size in bytes, when the listing reports one.
    pub size: Option<u64>,
}

impl RemoteEntry {
    /// An entry as returned from a directory listing, before the walker
    /// places it in the tree.
    pub fn listed(name: impl Into<String>, kind: EntryKind, size: Option<u64>) -> Self {
        Self {
            path: String::new(),
            name: name.into(),
            kind,
            depth: 0,
            size,
        }
    }

    /// `.` and `..` entries some servers include in listings.
    pub(crate) fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// The kind of a listed remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory ("folder" in FTP listings).
    Dir,

    /// A symbolic link. Never followed.
    Symlink,

    /// Anything else the server reports.
    Other,
}

/// Join a remote directory and a child name with exactly one `/`.
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
