//! Content fetcher: copy a `file://` source or an HTTP body into the target tree,
//! in fixed-size chunks so peak memory stays bounded.

use std::fs::{self, File};
use std::io::{self, Read, Write};

use crate::error_handling::{MipError, Result};
use crate::http_client::HttpTransport;
use crate::url;
use crate::utils;

/// Bytes read per chunk when copying or hashing.
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// Read `src` in `chunk_size` pieces and hand each to `sink`. Returns total bytes.
pub fn copy_chunked<R, F>(src: &mut R, chunk_size: usize, mut sink: F) -> io::Result<u64>
where
    R: Read + ?Sized,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Create every missing parent directory of `path`, one prefix at a time.
/// Handles absolute paths (leading `/`).
pub fn ensure_path_exists(path: &str) -> Result<()> {
    let mut split: Vec<&str> = path.split('/').collect();
    // The final segment is the file itself.
    split.pop();

    let mut prefix = String::new();
    for (i, part) in split.iter().enumerate() {
        if i > 0 {
            prefix.push('/');
        }
        prefix.push_str(part);
        if part.is_empty() {
            continue;
        }
        match fs::metadata(&prefix) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir(&prefix).map_err(|e| MipError::io("ensure_path_exists", &prefix, e))?;
            }
            Err(e) => return Err(MipError::io("ensure_path_exists", &prefix, e)),
        }
    }
    Ok(())
}

/// Stream `src` into `dest`. Read errors are fetch failures of `source`;
/// create, write and flush errors are `Io` on `dest`.
fn write_stream<R: Read + ?Sized>(src: &mut R, source: &str, dest: &str, chunk_size: usize) -> Result<u64> {
    ensure_path_exists(dest)?;
    let mut out = File::create(dest).map_err(|e| MipError::io("download_file", dest, e))?;
    let mut write_error = None;
    let copied = copy_chunked(src, chunk_size, |chunk| {
        out.write_all(chunk).map_err(|e| {
            let kind = e.kind();
            write_error = Some(e);
            io::Error::from(kind)
        })
    });
    if let Some(e) = write_error {
        return Err(MipError::io("download_file", dest, e));
    }
    let n = copied.map_err(|e| MipError::FetchFailed {
        url: source.to_string(),
        status: None,
        source: e.to_string(),
    })?;
    out.flush().map_err(|e| MipError::io("download_file", dest, e))?;
    Ok(n)
}

/// Copy `source` (a `file://` URL or an absolute HTTP URL) to `dest`.
/// Returns the number of bytes written.
pub fn download_file<T: HttpTransport + ?Sized>(
    transport: &T,
    source: &str,
    dest: &str,
    chunk_size: usize,
) -> Result<u64> {
    if let Some(src_name) = url::file_path(source) {
        let mut src = File::open(src_name).map_err(|_| MipError::SourceNotFound {
            path: src_name.to_string(),
        })?;
        utils::log(&format!("Copying file {} to {}", src_name, dest));
        return write_stream(&mut src, source, dest, chunk_size);
    }

    utils::log(&format!("Downloading {} to {}", source, dest));
    let response = transport.get(source).map_err(|e| MipError::FetchFailed {
        url: source.to_string(),
        status: None,
        source: e,
    })?;
    if !response.is_ok() {
        return Err(MipError::FetchFailed {
            url: source.to_string(),
            status: Some(response.status()),
            source: String::new(),
        });
    }
    let mut body = response.into_reader();
    write_stream(&mut body, source, dest, chunk_size)
}
