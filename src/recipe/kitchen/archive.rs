// src/recipe/kitchen/archive.rs

//! Archive and source file utilities for the Kitchen

use crate::checksum::{self, Checksum};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tar::Archive;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

fn stream_response_to_file(mut response: reqwest::blocking::Response, file: &mut File) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
    }

    Ok(downloaded)
}

/// Download a file from a URL, retrying transient failures
///
/// Data is streamed to a temporary sibling of `dest` which is renamed into
/// place only after the transfer completes.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

    let partial = dest.with_extension("part");
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("{url}: {e}")))
            .and_then(|response| {
                if !response.status().is_success() {
                    return Err(Error::DownloadError(format!("HTTP {} from {}", response.status(), url)));
                }
                let mut file = File::create(&partial)?;
                stream_response_to_file(response, &mut file)
            });

        match result {
            Ok(bytes) => {
                fs::rename(&partial, dest)?;
                info!("Downloaded {} ({} bytes)", url, bytes);
                return Ok(());
            }
            Err(e) if attempt < MAX_RETRIES => {
                warn!("Download attempt {} failed: {}. Retrying...", attempt, e);
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        }
    }
}

/// Fetch a source archive into the cache, verifying its checksum
///
/// Cached files are keyed by checksum, so a cache hit is verified again
/// before use and discarded if it no longer matches.
pub fn fetch_source(url: &str, expected: &str, cache_dir: &Path, offline: bool) -> Result<PathBuf> {
    let checksum = Checksum::parse(expected)?;
    fs::create_dir_all(cache_dir)?;
    let cached = cache_dir.join(checksum.cache_key());

    if cached.exists() {
        match checksum::verify_file(&cached, &checksum) {
            Ok(()) => {
                debug!("Using cached source {}", cached.display());
                return Ok(cached);
            }
            Err(e) => {
                warn!("Discarding cached {}: {}", cached.display(), e);
                fs::remove_file(&cached)?;
            }
        }
    }

    if offline {
        return Err(Error::DownloadError(format!(
            "{} is not cached and downloads are disabled (offline mode)",
            url
        )));
    }

    download_file(url, &cached)?;
    if let Err(e) = checksum::verify_file(&cached, &checksum) {
        let _ = fs::remove_file(&cached);
        return Err(e);
    }
    Ok(cached)
}

/// Extract an archive to a destination directory
///
/// `name` is the original file name and decides the format: `.tar.gz`,
/// `.tgz` or `.tar`.
pub fn extract_archive(archive: &Path, name: &str, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Archive::new(GzDecoder::new(file)).unpack(dest)?;
    } else if name.ends_with(".tar") {
        Archive::new(file).unpack(dest)?;
    } else {
        return Err(Error::Executor(format!("Unknown archive format: {}", name)));
    }

    debug!("Extracted {} into {}", name, dest.display());
    Ok(())
}

/// Locate the source root after extraction
///
/// Release tarballs usually hold a single top-level directory; otherwise the
/// extraction directory itself is the root.
pub fn source_root(extract_dir: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(extract_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    match entries.as_slice() {
        [single] if single.is_dir() => Ok(single.clone()),
        _ => Ok(extract_dir.to_path_buf()),
    }
}

/// Apply a patch to the source directory
pub fn apply_patch(source_dir: &Path, patch_path: &Path, strip: u32) -> Result<String> {
    if !patch_path.is_file() {
        return Err(Error::Executor(format!(
            "patch file {} does not exist",
            patch_path.display()
        )));
    }

    let output = Command::new("patch")
        .arg(format!("-p{}", strip))
        .arg("-i")
        .arg(patch_path)
        .current_dir(source_dir)
        .output()
        .map_err(|e| Error::Executor(format!("patch failed to start: {}", e)))?;

    let log = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        return Err(Error::Executor(format!(
            "Failed to apply patch {}: {}",
            patch_path.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(log)
}

/// Replace every occurrence of `from` with `to` in a source file
///
/// Returns the number of replacements.
pub fn apply_filter(source_dir: &Path, file: &str, from: &str, to: &str) -> Result<usize> {
    let path = source_dir.join(file);
    let content = fs::read_to_string(&path).map_err(|e| {
        Error::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    })?;

    let count = content.matches(from).count();
    if count == 0 {
        warn!("Filter on {} matched nothing: '{}'", file, from);
        return Ok(0);
    }

    fs::write(&path, content.replace(from, to))?;
    Ok(count)
}
