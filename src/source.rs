//! The four backing stores a file response can serve from.
//!
//! Every store exposes the same two capabilities: stat ("how long is
//! this representation, when did it change, does it exist") and opening
//! a byte stream for a selected span. Header planning runs strictly
//! between the two.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use axum::body::Body;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

use crate::error::FileResponseError;
use crate::range::ByteRange;
use crate::stream::{FileByteStream, NoSeek};
use crate::AsyncSeekStart;

/// Runtime facts about a source, resolved immediately before header
/// planning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceMetadata {
    /// Representation length in bytes. `None` disables range processing
    /// and the `Content-Length` header.
    pub length: Option<u64>,
    /// Modification time of the backing store, if it has one.
    pub modified: Option<SystemTime>,
}

/// A backing store for a file response.
///
/// `resolve` is called exactly once per response, before any header is
/// decided; `into_body` consumes the source and is called only when the
/// plan asks for a body.
pub trait FileSource {
    /// Stat the backing store.
    fn resolve(&mut self) -> impl Future<Output = Result<SourceMetadata, FileResponseError>> + Send;

    /// Open the byte stream for `range`, or for the whole representation
    /// when `range` is `None`.
    fn into_body(
        self,
        range: Option<ByteRange>,
    ) -> impl Future<Output = Result<Body, FileResponseError>> + Send;
}

/// Serves from any async reader. With a declared length the reader must
/// support seeking from the start; without one, range processing stays
/// off and the reader is drained forward-only.
pub struct StreamSource<R> {
    reader: R,
    length: Option<u64>,
}

impl<R> StreamSource<R>
where
    R: AsyncRead + AsyncSeekStart + Send + 'static,
{
    /// A seekable reader with a known representation length.
    pub fn sized(reader: R, length: u64) -> Self {
        StreamSource { reader, length: Some(length) }
    }
}

impl<R> StreamSource<R>
where
    R: AsyncRead + AsyncSeek + Send + Unpin + 'static,
{
    /// Determine the length by seeking to the end of the reader. The
    /// response body seeks back to its own start position before
    /// reading, so the cursor is left where the seek put it.
    pub async fn measure(mut reader: R) -> io::Result<Self> {
        let length = reader.seek(io::SeekFrom::End(0)).await?;
        Ok(StreamSource { reader, length: Some(length) })
    }
}

impl<R> StreamSource<NoSeek<R>>
where
    R: AsyncRead + Send + 'static,
{
    /// A forward-only reader of unknown length.
    pub fn unknown_length(reader: R) -> Self {
        StreamSource { reader: NoSeek::new(reader), length: None }
    }
}

impl<R> FileSource for StreamSource<R>
where
    R: AsyncRead + AsyncSeekStart + Send + 'static,
{
    async fn resolve(&mut self) -> Result<SourceMetadata, FileResponseError> {
        Ok(SourceMetadata { length: self.length, modified: None })
    }

    async fn into_body(self, range: Option<ByteRange>) -> Result<Body, FileResponseError> {
        Ok(body_for_reader(self.reader, range))
    }
}

/// Serves from an in-memory buffer. The length is always known, and a
/// range response is a zero-copy slice handed to the transport in one
/// piece.
pub struct BytesSource {
    bytes: Bytes,
}

impl BytesSource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        BytesSource { bytes: bytes.into() }
    }
}

impl FileSource for BytesSource {
    async fn resolve(&mut self) -> Result<SourceMetadata, FileResponseError> {
        Ok(SourceMetadata { length: Some(self.bytes.len() as u64), modified: None })
    }

    async fn into_body(self, range: Option<ByteRange>) -> Result<Body, FileResponseError> {
        let bytes = match range {
            Some(range) => self.bytes.slice(range.start as usize..=range.end as usize),
            None => self.bytes,
        };
        Ok(Body::from(bytes))
    }
}

/// Serves a file from disk by absolute or relative path. The stat
/// follows symbolic links to their final target, and a missing file is
/// reported before any header is written.
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PathSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn not_found(&self) -> FileResponseError {
        FileResponseError::NotFound(self.path.display().to_string())
    }
}

impl FileSource for PathSource {
    async fn resolve(&mut self) -> Result<SourceMetadata, FileResponseError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(self.not_found());
            }
            Err(error) => return Err(error.into()),
        };
        if !metadata.is_file() {
            return Err(self.not_found());
        }
        Ok(SourceMetadata {
            length: Some(metadata.len()),
            modified: metadata.modified().ok(),
        })
    }

    async fn into_body(self, range: Option<ByteRange>) -> Result<Body, FileResponseError> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(self.not_found());
            }
            Err(error) => return Err(error.into()),
        };
        Ok(body_for_reader(file, range))
    }
}

/// Stat result of a [`FileProvider`] lookup.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub length: u64,
    pub modified: Option<SystemTime>,
}

/// Resolves logical paths to files, decoupling virtual file responses
/// from the real filesystem.
pub trait FileProvider {
    type File: AsyncRead + AsyncSeekStart + Send + 'static;

    /// Stat the file at `path`; `Ok(None)` means it does not exist.
    fn stat(&self, path: &str) -> impl Future<Output = io::Result<Option<FileStat>>> + Send;

    /// Open the file at `path` for reading.
    fn open(&self, path: &str) -> impl Future<Output = io::Result<Self::File>> + Send;
}

impl<P: FileProvider + Sync> FileProvider for &P {
    type File = P::File;

    fn stat(&self, path: &str) -> impl Future<Output = io::Result<Option<FileStat>>> + Send {
        (**self).stat(path)
    }

    fn open(&self, path: &str) -> impl Future<Output = io::Result<Self::File>> + Send {
        (**self).open(path)
    }
}

/// A [`FileProvider`] rooted at a directory on disk.
///
/// Logical paths are interpreted relative to the root; leading `/` and
/// `~` are stripped and parent-directory components are rejected so a
/// lookup can never escape the root.
pub struct DirProvider {
    root: PathBuf,
}

impl DirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirProvider { root: root.into() }
    }

    fn locate(&self, path: &str) -> Option<PathBuf> {
        let trimmed = path.trim_start_matches('~').trim_start_matches('/');
        let mut full = self.root.clone();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(segment) => full.push(segment),
                Component::ParentDir => return None,
                _ => {}
            }
        }
        Some(full)
    }
}

impl FileProvider for DirProvider {
    type File = tokio::fs::File;

    async fn stat(&self, path: &str) -> io::Result<Option<FileStat>> {
        let Some(full) = self.locate(path) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&full).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(FileStat {
                length: metadata.len(),
                modified: metadata.modified().ok(),
            })),
            Ok(_) => Ok(None),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn open(&self, path: &str) -> io::Result<Self::File> {
        let Some(full) = self.locate(path) else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "path escapes provider root"));
        };
        tokio::fs::File::open(full).await
    }
}

/// Serves through a [`FileProvider`] under a logical path.
pub struct VirtualSource<P> {
    provider: P,
    path: String,
}

impl<P: FileProvider> VirtualSource<P> {
    pub fn new(provider: P, path: impl Into<String>) -> Self {
        VirtualSource { provider, path: path.into() }
    }
}

impl<P: FileProvider + Send + Sync> FileSource for VirtualSource<P> {
    async fn resolve(&mut self) -> Result<SourceMetadata, FileResponseError> {
        match self.provider.stat(&self.path).await? {
            Some(stat) => Ok(SourceMetadata {
                length: Some(stat.length),
                modified: stat.modified,
            }),
            None => Err(FileResponseError::NotFound(self.path.clone())),
        }
    }

    async fn into_body(self, range: Option<ByteRange>) -> Result<Body, FileResponseError> {
        let file = match self.provider.open(&self.path).await {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(FileResponseError::NotFound(self.path));
            }
            Err(error) => return Err(error.into()),
        };
        Ok(body_for_reader(file, range))
    }
}

fn body_for_reader<R>(reader: R, range: Option<ByteRange>) -> Body
where
    R: AsyncRead + AsyncSeekStart + Send + 'static,
{
    let stream = match range {
        Some(range) => FileByteStream::new(reader, range.start, Some(range.length())),
        None => FileByteStream::new(reader, 0, None),
    };
    Body::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::StreamExt;

    async fn collect(body: Body) -> Vec<u8> {
        let mut stream = body.into_data_stream();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await.transpose().unwrap() {
            collected.extend_from_slice(&chunk);
        }
        collected
    }

    #[tokio::test]
    async fn bytes_source_reports_length() {
        let mut source = BytesSource::new(&b"0123456789"[..]);
        let metadata = source.resolve().await.unwrap();
        assert_eq!(Some(10), metadata.length);
        assert_eq!(None, metadata.modified);
    }

    #[tokio::test]
    async fn bytes_source_slices_ranges() {
        let source = BytesSource::new(&b"0123456789"[..]);
        let body = source.into_body(Some(ByteRange::new(2, 5))).await.unwrap();
        assert_eq!(b"2345".to_vec(), collect(body).await);
    }

    #[tokio::test]
    async fn sized_stream_source_serves_span() {
        let reader = std::io::Cursor::new(b"0123456789".to_vec());
        let source = StreamSource::sized(reader, 10);
        let body = source.into_body(Some(ByteRange::new(5, 9))).await.unwrap();
        assert_eq!(b"56789".to_vec(), collect(body).await);
    }

    #[tokio::test]
    async fn unsized_stream_source_has_no_length() {
        let mut source = StreamSource::unknown_length(std::io::Cursor::new(b"abc".to_vec()));
        let metadata = source.resolve().await.unwrap();
        assert_eq!(None, metadata.length);
        let body = source.into_body(None).await.unwrap();
        assert_eq!(b"abc".to_vec(), collect(body).await);
    }

    #[tokio::test]
    async fn path_source_stats_fixture() {
        let mut source = PathSource::new("test/fixture.txt");
        let metadata = source.resolve().await.unwrap();
        assert_eq!(Some(54), metadata.length);
        assert!(metadata.modified.is_some());
    }

    #[tokio::test]
    async fn path_source_reports_missing_file() {
        let mut source = PathSource::new("test/no-such-file.txt");
        let error = source.resolve().await.unwrap_err();
        assert_matches!(error, FileResponseError::NotFound(path) => {
            assert!(path.contains("no-such-file.txt"));
        });
    }

    #[tokio::test]
    async fn path_source_rejects_directories() {
        let mut source = PathSource::new("test");
        assert_matches!(source.resolve().await, Err(FileResponseError::NotFound(_)));
    }

    #[tokio::test]
    async fn dir_provider_resolves_relative_and_absolute_paths() {
        let provider = DirProvider::new("test");
        assert!(provider.stat("fixture.txt").await.unwrap().is_some());
        assert!(provider.stat("/fixture.txt").await.unwrap().is_some());
        assert!(provider.stat("~/fixture.txt").await.unwrap().is_some());
        assert!(provider.stat("missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dir_provider_rejects_traversal() {
        let provider = DirProvider::new("test");
        assert!(provider.stat("../Cargo.toml").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn virtual_source_serves_through_provider() {
        let source = VirtualSource::new(DirProvider::new("test"), "fixture.txt");
        let body = source.into_body(Some(ByteRange::new(0, 4))).await.unwrap();
        assert_eq!(b"Hello".to_vec(), collect(body).await);
    }

    #[tokio::test]
    async fn virtual_source_reports_missing_file() {
        let mut source = VirtualSource::new(DirProvider::new("test"), "missing.txt");
        assert_matches!(source.resolve().await, Err(FileResponseError::NotFound(_)));
    }
}
