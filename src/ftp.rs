//! FTP sessions over [`suppaftp`].

use std::net::ToSocketAddrs;
use std::time::Duration;

use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;

use crate::entry::{EntryKind, RemoteEntry};
use crate::error::CrawlError;
use crate::request::CrawlTarget;
use crate::traits::{Connector, RemoteSession};

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Opens plain (unencrypted) FTP sessions in passive mode.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    default_port: u16,
    connect_timeout: Option<Duration>,
}

impl Default for FtpConnector {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_FTP_PORT,
            connect_timeout: None,
        }
    }
}

impl FtpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port used when the target host does not name one.
    pub fn default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn dial(&self, addr: &str) -> Result<FtpStream, CrawlError> {
        match self.connect_timeout {
            Some(timeout) => {
                let sock = addr
                    .to_socket_addrs()
                    .map_err(|e| CrawlError::connect(addr, e))?
                    .next()
                    .ok_or_else(|| CrawlError::connect(addr, "address resolved to nothing"))?;
                FtpStream::connect_timeout(sock, timeout).map_err(|e| CrawlError::connect(addr, e))
            }
            None => FtpStream::connect(addr).map_err(|e| CrawlError::connect(addr, e)),
        }
    }
}

impl Connector for FtpConnector {
    fn connect(&self, target: &CrawlTarget) -> Result<Box<dyn RemoteSession>, CrawlError> {
        let addr = target.address(self.default_port);
        let mut stream = self.dial(&addr)?;

        if let Err(e) = stream.login(&target.user, &target.password) {
            let _ = stream.quit();
            return Err(CrawlError::login(&target.user, e));
        }
        if let Err(e) = stream.transfer_type(FileType::Binary) {
            let _ = stream.quit();
            return Err(CrawlError::connect(&addr, e));
        }

        debug!("ftp session open on {}", addr);
        Ok(Box::new(FtpSession { stream }))
    }
}

struct FtpSession {
    stream: FtpStream,
}

impl RemoteSession for FtpSession {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, CrawlError> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| CrawlError::list(path, e))?;
        Ok(parse_listing(&lines))
    }

    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, CrawlError> {
        self.stream
            .retr_as_buffer(path)
            .map(|cursor| cursor.into_inner())
            .map_err(|e| CrawlError::retrieve(path, e))
    }

    fn close(&mut self) -> Result<(), CrawlError> {
        self.stream.quit().map_err(|e| CrawlError::Close(Box::new(e)))
    }
}

/// Parse LIST output (POSIX or DOS style). Lines that are not entries,
/// such as `total 12`, are skipped.
fn parse_listing(lines: &[String]) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| match File::try_from(line.as_str()) {
            Ok(file) => Some(to_entry(&file)),
            Err(_) => {
                debug!("skipping unparsable listing line: {:?}", line);
                None
            }
        })
        .collect()
}

fn to_entry(file: &File) -> RemoteEntry {
    let kind = if file.is_directory() {
        EntryKind::Dir
    } else if file.is_symlink() {
        EntryKind::Symlink
    } else if file.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    RemoteEntry::listed(file.name(), kind, Some(file.size() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_posix_listing() {
        let lines = vec![
            "total 12".to_string(),
            "drwxr-xr-x 2 0 0 4096 Nov 5 2018 lib".to_string(),
            "-rw-r--r-- 1 0 0 120 Nov 5 2018 index.php".to_string(),
        ];
        let entries = parse_listing(&lines);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "lib");
        assert_eq!(entries[0].kind, EntryKind::Dir);
        assert_eq!(entries[1].name, "index.php");
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[1].size, Some(120));
    }

    #[test]
    fn unreachable_host_is_connectivity_error() {
        // Bind then release a port so nothing is listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let connector = FtpConnector::new().connect_timeout(Duration::from_secs(2));
        let target = CrawlTarget::new(format!("127.0.0.1:{port}"), "u", "p", "/");
        let err = connector.connect(&target).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }
}
