use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Random-access destination for downloaded bytes.
///
/// `write_at` carries its own offset and takes `&self`, so concurrent callers
/// writing disjoint regions never share a cursor.
pub trait Sink: Send + Sync + 'static {
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Called once, after every writer has finished.
    fn finish(&self) -> io::Result<()>;
}

#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    /// Create (or truncate) the file at `path`, creating missing parent
    /// directories, and pre-allocate `size` bytes when known.
    pub fn create(path: &Path, size: Option<u64>) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        if let Some(size) = size {
            file.set_len(size)?;
        }

        Ok(FileSink {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    #[cfg(unix)]
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_write(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn finish(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}
