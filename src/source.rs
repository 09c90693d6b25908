//! Sample Sources
//!
//! A producer thread reads (and decompresses) each source into memory and hands
//! it to the scanner through a bounded channel, so preparing the next
//! document overlaps with parsing the current one. Only the channel crosses
//! the thread boundary; the schema tree stays on the consuming side.

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use walkdir::WalkDir;

use crate::error::{Result, TypegenError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Where a sample document comes from
#[derive(Debug, Clone)]
pub enum SourceSpec {
    File(PathBuf),
    Stdin,
    /// Fetched with a blocking HTTP(S) GET
    Url(String),
    /// Document already in memory (tests, embedding)
    Inline { name: String, content: Vec<u8> },
}

impl SourceSpec {
    pub fn inline(name: &str, content: impl Into<Vec<u8>>) -> Self {
        Self::Inline {
            name: name.to_string(),
            content: content.into(),
        }
    }

    /// Display name used in logs, errors and generated headers
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "<stdin>".to_string(),
            Self::Url(url) => url.clone(),
            Self::Inline { name, .. } => name.clone(),
        }
    }

    /// Read the whole source, transparently decompressing gzip and bzip2
    pub fn prepare(self) -> Result<PreparedSource> {
        let name = self.name();
        let io_error = |source| TypegenError::Source {
            name: name.clone(),
            source,
        };
        let raw = match self {
            Self::File(path) => std::fs::read(&path).map_err(io_error)?,
            Self::Stdin => {
                let mut bytes = Vec::new();
                io::stdin().read_to_end(&mut bytes).map_err(io_error)?;
                bytes
            }
            Self::Url(url) => fetch(&url)?,
            Self::Inline { content, .. } => content,
        };

        let bytes = if raw.starts_with(&GZIP_MAGIC) {
            decompress(GzDecoder::new(raw.as_slice())).map_err(io_error)?
        } else if raw.starts_with(&BZIP2_MAGIC) {
            decompress(BzDecoder::new(raw.as_slice())).map_err(io_error)?
        } else {
            raw
        };

        Ok(PreparedSource { name, bytes })
    }
}

fn decompress(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    reader.read_to_end(&mut decoded)?;
    Ok(decoded)
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let fetch_error = |source| TypegenError::Fetch {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(fetch_error)?;
    let body = response.bytes().map_err(fetch_error)?;
    tracing::debug!(url, bytes = body.len(), "fetched sample document");
    Ok(body.to_vec())
}

/// A source ready to be parsed
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Expand command-line paths: directories are walked for `.xml`, `.xml.gz` and `.xml.bz2` files
pub fn expand_paths(paths: &[PathBuf]) -> Vec<SourceSpec> {
    let mut specs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_xml_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            tracing::debug!(dir = %path.display(), files = found.len(), "expanded source directory");
            specs.extend(found.into_iter().map(SourceSpec::File));
        } else {
            specs.push(SourceSpec::File(path.clone()));
        }
    }
    specs
}

fn is_xml_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".xml") || name.ends_with(".xml.gz") || name.ends_with(".xml.bz2")
}

/// Bounded hand-off queue fed by a producer thread
pub struct SourceQueue {
    receiver: Option<Receiver<Result<PreparedSource>>>,
    producer: Option<JoinHandle<()>>,
}

impl SourceQueue {
    /// Start preparing sources with room for one ready document
    pub fn spawn(specs: Vec<SourceSpec>) -> Self {
        Self::with_capacity(specs, 1)
    }

    pub fn with_capacity(specs: Vec<SourceSpec>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let producer = thread::spawn(move || {
            for spec in specs {
                let name = spec.name();
                let prepared = spec.prepare();
                tracing::debug!(source = %name, ok = prepared.is_ok(), "source prepared");
                if sender.send(prepared).is_err() {
                    // Consumer went away (fatal error downstream)
                    break;
                }
            }
        });
        Self {
            receiver: Some(receiver),
            producer: Some(producer),
        }
    }
}

impl Iterator for SourceQueue {
    type Item = Result<PreparedSource>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for SourceQueue {
    fn drop(&mut self) {
        // Closing the receiver unblocks a producer waiting on a full channel
        self.receiver.take();
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                tracing::warn!("source producer thread panicked");
            }
        }
    }
}
