use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use zip::result::{ZipError, ZipResult};
use zip::ZipArchive;

use crate::archive::content_type::content_type_for;
use crate::error::RepoError;

/// tried in this order when a directory is requested
pub const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

const CHUNK_SIZE: usize = 64 * 1024;
/// chunks read ahead of the consumer
const READ_AHEAD: usize = 4;

type JarArchive = ZipArchive<BufReader<File>>;

/// A single file served out of a documentation archive
pub struct ArchiveContent {
    pub entry_name: String,
    pub content_type: String,
    /// the size recorded in the archive, known before `data` is polled. It comes from the
    ///  archive's headers and is not checked against the actual data.
    pub length: u64,
    pub data: Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send + 'static>>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct EntryInfo {
    name: String,
    is_dir: bool,
    size: u64,
}

/// Maps a path inside a downloaded documentation jar to the entry to serve, falling back to index
///  files for directories
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveContentResolver;

impl ArchiveContentResolver {
    pub async fn resolve(&self, archive: &Path, sub_path: &str) -> Result<ArchiveContent, RepoError> {
        let archive_path = archive.to_path_buf();
        let sub_path = sub_path.to_string();

        let (archive, entry) = tokio::task::spawn_blocking(move || open_entry(&archive_path, &sub_path))
            .await
            .map_err(|e| RepoError::repository(format!("reading archive entry failed: {}", e)))??;

        // the archive stays open while the entry is read, so a concurrent deletion of the file
        //  does not affect a response that is already being sent
        let (sender, receiver) = mpsc::channel(READ_AHEAD);
        let entry_name = entry.name.clone();
        tokio::task::spawn_blocking(move || send_chunks(archive, &entry_name, sender));

        let data = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv()
                .await
                .map(|chunk| (chunk, receiver))
        });

        Ok(ArchiveContent {
            content_type: content_type_for(&entry.name),
            length: entry.size,
            entry_name: entry.name,
            data: Box::pin(data),
        })
    }
}

fn invalid_archive(archive: &Path, e: impl Display) -> RepoError {
    RepoError::InvalidArchive {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    }
}

fn open_entry(archive_path: &Path, sub_path: &str) -> Result<(JarArchive, EntryInfo), RepoError> {
    let file = File::open(archive_path)
        .map_err(|e| RepoError::storage(archive_path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| invalid_archive(archive_path, e))?;

    let entry = resolve_entry(&mut archive, sub_path)
        .map_err(|e| invalid_archive(archive_path, e))?
        .ok_or_else(|| RepoError::EntryNotFound {
            archive: PathBuf::from(archive_path),
            entry: sub_path.to_string(),
        })?;
    trace!("serving {} for {:?} from {}", entry.name, sub_path, archive_path.display());

    Ok((archive, entry))
}

/// Reads an entry chunk by chunk, stopping early when the receiving side goes away. Runs on a
///  blocking thread, the channel's capacity bounds what is held in memory.
fn send_chunks(mut archive: JarArchive, entry_name: &str, sender: mpsc::Sender<anyhow::Result<Bytes>>) {
    let mut zip_file = match archive.by_name(entry_name) {
        Ok(zip_file) => zip_file,
        Err(e) => {
            let _ = sender.blocking_send(Err(e.into()));
            return;
        }
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let chunk = match zip_file.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) => Err(anyhow::Error::new(e).context(format!("reading {}", entry_name))),
        };
        let failed = chunk.is_err();

        if sender.blocking_send(chunk).is_err() {
            debug!("client went away while {} was being sent", entry_name);
            return;
        }
        if failed {
            return;
        }
    }
}

fn resolve_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, sub_path: &str) -> ZipResult<Option<EntryInfo>> {
    let sub_path = sub_path.trim_start_matches('/');

    let Some(mut entry) = lookup(archive, sub_path)? else {
        return Ok(None);
    };

    // some archives record a directory both as an empty file and as a directory entry
    if !entry.is_dir && entry.size == 0 && !sub_path.ends_with('/') {
        if let Some(directory) = lookup_exact(archive, &format!("{}/", sub_path))? {
            if directory.is_dir {
                entry = directory;
            }
        }
    }

    if !entry.is_dir {
        return Ok(Some(entry));
    }

    let directory = if sub_path.ends_with('/') {
        sub_path.to_string()
    }
    else {
        format!("{}/", sub_path)
    };
    for index_file in INDEX_FILES {
        if let Some(index) = lookup_exact(archive, &format!("{}{}", directory, index_file))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Looks up an entry the way jar files do: a name without trailing '/' also finds the directory
fn lookup<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ZipResult<Option<EntryInfo>> {
    if let Some(entry) = lookup_exact(archive, name)? {
        return Ok(Some(entry));
    }
    if name.is_empty() || name.ends_with('/') {
        return Ok(None);
    }
    lookup_exact(archive, &format!("{}/", name))
}

fn lookup_exact<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ZipResult<Option<EntryInfo>> {
    match archive.by_name(name) {
        Ok(file) => Ok(Some(EntryInfo {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
            size: file.size(),
        })),
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}
