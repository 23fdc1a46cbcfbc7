use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha512};

const READ_BUF_LEN: usize = 64 * 1024;

/// Content digests of a firmware image, computed from the exact bytes about to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Lowercase hex MD5. Compared against what the device reports.
    pub md5: String,
    /// Lowercase hex SHA-512. Informational only.
    pub sha512: String,
    pub size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("firmware not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FingerprintError {
    pub fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(err)
        }
    }
}

/// Hash everything `reader` yields through MD5 and SHA-512 in a single pass.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut md5 = Md5::new();
    let mut sha512 = Sha512::new();
    let mut size = 0u64;
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        md5.update(&buf[..n]);
        sha512.update(&buf[..n]);
        size += n as u64;
    }

    Ok(Fingerprint {
        md5: hex::encode(md5.finalize()),
        sha512: hex::encode(sha512.finalize()),
        size,
    })
}

/// An open firmware file together with the fingerprint of its contents.
///
/// `file` is rewound to offset 0, so the bytes streamed from it are the bytes that were hashed.
#[derive(Debug)]
pub struct FingerprintedFile {
    pub file: File,
    pub fingerprint: Fingerprint,
}

/// Open `path` and fingerprint it.
///
/// Anything that is not a regular file (directories included) is reported as
/// [`FingerprintError::NotFound`].
pub fn fingerprint_file(path: &Path) -> Result<FingerprintedFile, FingerprintError> {
    let mut file = File::open(path).map_err(FingerprintError::from_io)?;
    if !file.metadata()?.is_file() {
        return Err(FingerprintError::NotFound);
    }

    let fingerprint = fingerprint_reader(&file)?;
    file.seek(SeekFrom::Start(0))?;

    Ok(FingerprintedFile { file, fingerprint })
}
