//! Append-only file back-end. One file per process, named `doom-<epoch>.log`.

use super::Transport;
use crate::error::{RuntimeError, SetupError};
use crate::logging::{self, Logger};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
fn tighten_permissions(file: &File) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = file.metadata() {
        let mut perms = metadata.permissions();
        perms.set_mode(0o644);
        let _ = file.set_permissions(perms);
    }
}

#[cfg(not(unix))]
fn tighten_permissions(_file: &File) {}

/// Writes one newline-delimited JSON record per `write` call to `doom-<epoch-seconds>.log`.
pub struct FileTransport {
    file: Option<File>,
    log: Logger,
}

impl FileTransport {
    pub fn new(log: Logger) -> FileTransport {
        FileTransport { file: None, log }
    }

    fn file_name() -> String {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("doom-{}.log", epoch)
    }
}

impl Transport for FileTransport {
    fn init(&mut self) -> Result<(), SetupError> {
        let name = Self::file_name();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&name)
            .map_err(|_| SetupError::Connect)?;

        tighten_permissions(&file);
        logging::info!(self.log, "telemetry file back-end opened"; "file" => name);
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        let file = self.file.as_mut().ok_or(RuntimeError::WriteZero)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    #[test]
    fn emits_three_newline_delimited_records_and_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut transport = FileTransport::new(logging::discard());
        transport.init().unwrap();

        transport.write(br#"{"counter":0}"#).unwrap();
        transport.write(br#"{"counter":1}"#).unwrap();
        transport.write(br#"{"counter":2}"#).unwrap();
        transport.close();

        let mut contents = String::new();
        let mut entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries.pop().unwrap().unwrap().path();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], r#"{"counter":1}"#);
        assert!(contents.ends_with('\n'));

        std::env::set_current_dir(prev).unwrap();
    }
}
