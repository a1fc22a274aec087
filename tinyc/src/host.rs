//! Host environment interface
//!
//! Syscalls never touch the operating system directly. Files and output
//! go through a [`Host`], so programs can be run against the real system
//! or against an in-memory stand-in.
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Read, Write},
};

/// Hooks to provide files and output to the virtual machine.
///
/// Return values follow the C conventions: descriptors and byte
/// counts are non-negative, and `-1` signals failure.
pub trait Host {
    /// Open the file at `path` for reading, returning its descriptor.
    fn open(&mut self, path: &[u8], flags: i64) -> i64;

    /// Read up to `buf.len()` bytes, returning the number read.
    fn read(&mut self, fd: i64, buf: &mut [u8]) -> i64;

    fn close(&mut self, fd: i64) -> i64;

    /// Write program output.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered output, called when the program exits.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// First descriptor handed out, after stdin, stdout and stderr.
const FIRST_FD: i64 = 3;

/// Host backed by the file system and the process' standard streams.
pub struct StdHost {
    files: BTreeMap<i64, File>,
    next_fd: i64,
    stdout: io::Stdout,
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl StdHost {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            next_fd: FIRST_FD,
            stdout: io::stdout(),
        }
    }
}

impl Host for StdHost {
    fn open(&mut self, path: &[u8], _flags: i64) -> i64 {
        let path = String::from_utf8_lossy(path);
        match File::open(path.as_ref()) {
            Ok(file) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, file);
                fd
            }
            Err(err) => {
                log::debug!("open '{path}': {err}");
                -1
            }
        }
    }

    fn read(&mut self, fd: i64, buf: &mut [u8]) -> i64 {
        let result = if fd == 0 {
            io::stdin().read(buf)
        } else {
            match self.files.get_mut(&fd) {
                Some(file) => file.read(buf),
                None => return -1,
            }
        };
        result.map(|n| n as i64).unwrap_or(-1)
    }

    fn close(&mut self, fd: i64) -> i64 {
        match self.files.remove(&fd) {
            Some(_) => 0,
            None => -1,
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

/// Host that keeps output in memory and serves files from a table.
#[derive(Debug, Default)]
pub struct CaptureHost {
    output: Vec<u8>,
    files: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Open descriptors, with the file contents and read position.
    open: BTreeMap<i64, (Vec<u8>, usize)>,
    next_fd: i64,
}

impl CaptureHost {
    pub fn new() -> Self {
        Self {
            next_fd: FIRST_FD,
            ..Default::default()
        }
    }

    /// Make a file available to `open`.
    pub fn with_file(mut self, path: impl AsRef<[u8]>, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(path.as_ref().to_vec(), contents.as_ref().to_vec());
        self
    }

    /// Everything the program has written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Number of descriptors that are still open.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl Host for CaptureHost {
    fn open(&mut self, path: &[u8], _flags: i64) -> i64 {
        match self.files.get(path) {
            Some(contents) => {
                let fd = self.next_fd.max(FIRST_FD);
                self.next_fd = fd + 1;
                self.open.insert(fd, (contents.clone(), 0));
                fd
            }
            None => -1,
        }
    }

    fn read(&mut self, fd: i64, buf: &mut [u8]) -> i64 {
        match self.open.get_mut(&fd) {
            Some((contents, pos)) => {
                let remaining = &contents[*pos..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                *pos += n;
                n as i64
            }
            None => -1,
        }
    }

    fn close(&mut self, fd: i64) -> i64 {
        match self.open.remove(&fd) {
            Some(_) => 0,
            None => -1,
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capture_files() {
        let mut host = CaptureHost::new().with_file("in.txt", "hello");
        assert_eq!(host.open(b"missing.txt", 0), -1);

        let fd = host.open(b"in.txt", 0);
        assert_eq!(fd, FIRST_FD);

        let mut buf = [0; 3];
        assert_eq!(host.read(fd, &mut buf), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(host.read(fd, &mut buf), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(host.read(fd, &mut buf), 0);

        assert_eq!(host.close(fd), 0);
        assert_eq!(host.close(fd), -1);
        assert_eq!(host.read(fd, &mut buf), -1);
    }

    #[test]
    fn test_capture_output() {
        let mut host = CaptureHost::new();
        host.write(b"a").unwrap();
        host.write(b"bc").unwrap();
        assert_eq!(host.output_str(), "abc");
    }
}
