//! Filesystem-backed upload store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::StoreError;
use super::filename::{is_plain_component, normalize_component};
use crate::config::StorageConfig;
use crate::identifier::{Identifier, IdentifierAllocator, IdentifierError};

/// Default number of identifiers tried before an upload gives up.
pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 4;

/// Longest path component common filesystems accept, in bytes.
pub const MAX_SEGMENT_BYTES: usize = 255;

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Directory name the file was stored under
    pub identifier: Identifier,
    /// Sanitized filename inside the identifier directory
    pub filename: String,
    /// Bytes copied from the content stream
    pub bytes_written: u64,
    /// Location on disk
    pub path: PathBuf,
}

/// Open handle to a stored file, ready to be streamed.
#[derive(Debug)]
pub struct StoredFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl StoredFile {
    /// Size of the file in bytes at open time.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true for zero-byte files.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consumes the handle and returns the open file.
    pub fn into_file(self) -> File {
        self.file
    }
}

/// File system-based upload storage.
///
/// Every upload gets its own `root/identifier` directory holding exactly the
/// uploaded file. The store never limits how many bytes it copies; callers
/// must bound the content stream before handing it over.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    allocator: IdentifierAllocator,
    max_allocation_attempts: u32,
}

impl FileStore {
    /// Creates a store rooted at `root` minting identifiers with `allocator`.
    pub fn new(root: PathBuf, allocator: IdentifierAllocator) -> Self {
        Self {
            root,
            allocator,
            max_allocation_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
        }
    }

    /// Creates a store from storage configuration using the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// - `IdentifierError::InvalidLength` - If the configured identifier length is zero
    pub fn from_config(config: &StorageConfig) -> Result<Self, IdentifierError> {
        let allocator = IdentifierAllocator::os(config.identifier_length)?;
        Ok(Self::new(config.upload_root(), allocator)
            .with_max_allocation_attempts(config.max_allocation_attempts))
    }

    /// Sets how many identifiers an upload tries before failing. Minimum one.
    pub fn with_max_allocation_attempts(mut self, attempts: u32) -> Self {
        self.max_allocation_attempts = attempts.max(1);
        self
    }

    /// Directory holding all identifier directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes `root/identifier/filename` without touching the filesystem.
    pub fn path_for(&self, identifier: &str, filename: &str) -> PathBuf {
        self.root.join(identifier).join(filename)
    }

    /// Stores `content` under a freshly allocated identifier.
    ///
    /// The identifier directory is created non-recursively, so an identifier
    /// already present on disk is detected and another one is drawn. If the
    /// file cannot be created or the copy fails, the identifier directory is
    /// removed along with any partial file.
    ///
    /// # Errors
    ///
    /// - `StoreError::Allocation` - If the randomness source failed
    /// - `StoreError::IdentifierExhausted` - If every attempted identifier was taken
    /// - `StoreError::CreateDirectory` - If the root or identifier directory could not be created
    /// - `StoreError::CreateFile` - If the target file could not be created
    /// - `StoreError::CopyFailed` - If reading the stream or writing the file failed
    pub async fn write<R>(&self, filename: &str, content: R) -> Result<StoredUpload, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let filename = normalize_component(filename);
        self.ensure_root().await?;

        let (identifier, directory) = self.claim_directory().await?;
        let path = directory.join(&filename);

        match copy_into(&path, content).await {
            Ok(bytes_written) => {
                info!(
                    identifier = %identifier,
                    filename = %filename,
                    bytes = bytes_written,
                    "Stored upload"
                );
                Ok(StoredUpload {
                    identifier,
                    filename,
                    bytes_written,
                    path,
                })
            }
            Err(e) => {
                // The identifier directory was created for this upload only.
                discard_directory(&directory).await;
                Err(e)
            }
        }
    }

    /// Stores `content` under a caller-chosen identifier.
    ///
    /// Missing directories are created and an existing file of the same name
    /// is overwritten. A partial file is removed on copy failure.
    ///
    /// # Errors
    ///
    /// - `StoreError::CreateDirectory` - If the identifier directory could not be created
    /// - `StoreError::CreateFile` - If the target file could not be created
    /// - `StoreError::CopyFailed` - If reading the stream or writing the file failed
    pub async fn write_as<R>(
        &self,
        identifier: Identifier,
        filename: &str,
        content: R,
    ) -> Result<StoredUpload, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let filename = normalize_component(filename);
        let directory = self.root.join(identifier.as_str());
        fs::create_dir_all(&directory)
            .await
            .map_err(|source| StoreError::CreateDirectory {
                path: directory.clone(),
                source,
            })?;

        let path = directory.join(&filename);
        match copy_into(&path, content).await {
            Ok(bytes_written) => Ok(StoredUpload {
                identifier,
                filename,
                bytes_written,
                path,
            }),
            Err(e) => {
                if matches!(e, StoreError::CopyFailed { .. }) {
                    if let Err(cleanup) = fs::remove_file(&path).await {
                        warn!("Failed to remove partial upload {}: {cleanup}", path.display());
                    }
                }
                Err(e)
            }
        }
    }

    /// Resolves the on-disk path of the regular file stored under
    /// (identifier, filename).
    ///
    /// Segments are taken as given, but anything that is not a single plain
    /// path component, or is longer than a filesystem name allows, is treated
    /// as absent.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` - If no regular file exists at the pair's path
    /// - `StoreError::Read` - If the path exists but its metadata could not be read
    pub async fn locate(&self, identifier: &str, filename: &str) -> Result<PathBuf, StoreError> {
        self.stat(identifier, filename).await.map(|(path, _)| path)
    }

    /// Opens the file stored under (identifier, filename).
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` - If no regular file exists at the pair's path
    /// - `StoreError::Read` - If the file exists but could not be opened
    pub async fn open(&self, identifier: &str, filename: &str) -> Result<StoredFile, StoreError> {
        let (path, metadata) = self.stat(identifier, filename).await?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if is_absent(&e) => return Err(not_found(identifier, filename)),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        debug!(identifier, filename, bytes = metadata.len(), "Opened stored file");
        Ok(StoredFile {
            file,
            path,
            len: metadata.len(),
        })
    }

    async fn stat(
        &self,
        identifier: &str,
        filename: &str,
    ) -> Result<(PathBuf, std::fs::Metadata), StoreError> {
        if !is_stored_segment(identifier) || !is_stored_segment(filename) {
            debug!("Rejected download path {identifier:?}/{filename:?}");
            return Err(not_found(identifier, filename));
        }

        let path = self.path_for(identifier, filename);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if is_absent(&e) => return Err(not_found(identifier, filename)),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        if !metadata.is_file() {
            return Err(not_found(identifier, filename));
        }

        Ok((path, metadata))
    }

    async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::CreateDirectory {
                path: self.root.clone(),
                source,
            })
    }

    async fn claim_directory(&self) -> Result<(Identifier, PathBuf), StoreError> {
        for attempt in 1..=self.max_allocation_attempts {
            let identifier = self.allocator.generate()?;
            let directory = self.root.join(identifier.as_str());

            match fs::create_dir(&directory).await {
                Ok(()) => return Ok((identifier, directory)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(
                        identifier = %identifier,
                        attempt,
                        "Identifier already in use, allocating another"
                    );
                }
                Err(source) => {
                    return Err(StoreError::CreateDirectory {
                        path: directory,
                        source,
                    });
                }
            }
        }

        Err(StoreError::IdentifierExhausted {
            attempts: self.max_allocation_attempts,
        })
    }
}

async fn copy_into<R>(path: &Path, mut content: R) -> Result<u64, StoreError>
where
    R: AsyncRead + Unpin,
{
    let mut file = File::create(path)
        .await
        .map_err(|source| StoreError::CreateFile {
            path: path.to_path_buf(),
            source,
        })?;

    let copy_failed = |source: std::io::Error| StoreError::CopyFailed {
        path: path.to_path_buf(),
        source,
    };

    let bytes_written = tokio::io::copy(&mut content, &mut file)
        .await
        .map_err(copy_failed)?;
    file.flush().await.map_err(copy_failed)?;

    Ok(bytes_written)
}

async fn discard_directory(directory: &Path) {
    if let Err(e) = fs::remove_dir_all(directory).await {
        warn!("Failed to remove partial upload {}: {e}", directory.display());
    }
}

fn not_found(identifier: &str, filename: &str) -> StoreError {
    StoreError::NotFound {
        identifier: identifier.to_string(),
        filename: filename.to_string(),
    }
}

fn is_stored_segment(segment: &str) -> bool {
    segment.len() <= MAX_SEGMENT_BYTES && is_plain_component(segment)
}

/// Errors meaning nothing was ever stored at the path.
///
/// `InvalidFilename` covers names the filesystem refuses outright, such as
/// over-long components. No upload can have produced those.
fn is_absent(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidFilename
    )
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, ReadBuf};

    use super::*;
    use crate::identifier::{RandomSource, SeededRandom};

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let allocator = IdentifierAllocator::new(Arc::new(SeededRandom::new(1)), 6).unwrap();
        let store = FileStore::new(temp_dir.path().join("uploads"), allocator);
        (store, temp_dir)
    }

    async fn read_back(store: &FileStore, identifier: &str, filename: &str) -> Vec<u8> {
        let stored = store.open(identifier, filename).await.unwrap();
        let mut bytes = Vec::new();
        stored.into_file().read_to_end(&mut bytes).await.unwrap();
        bytes
    }

    /// Yields some bytes, then fails like a dropped connection.
    struct BrokenStream {
        sent: bool,
    }

    impl AsyncRead for BrokenStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "client went away",
                )));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    struct FailingRandom;

    impl RandomSource for FailingRandom {
        fn fill(&self, _buf: &mut [u8]) -> Result<(), IdentifierError> {
            Err(IdentifierError::EntropyUnavailable {
                reason: "no entropy".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_write_then_open_round_trip() {
        let (store, _temp_dir) = create_test_store();

        let upload = store.write("name.txt", &b"hello world"[..]).await.unwrap();

        assert_eq!(upload.filename, "name.txt");
        assert_eq!(upload.bytes_written, 11);
        assert_eq!(upload.identifier.len(), 6);
        assert_eq!(
            upload.path,
            store.path_for(upload.identifier.as_str(), "name.txt")
        );
        assert_eq!(
            read_back(&store, upload.identifier.as_str(), "name.txt").await,
            b"hello world"
        );
    }

    #[tokio::test]
    async fn test_write_creates_missing_root() {
        let (store, _temp_dir) = create_test_store();
        assert!(!store.root().exists());

        store.write("a.bin", &b"x"[..]).await.unwrap();

        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn test_empty_content_creates_empty_file() {
        let (store, _temp_dir) = create_test_store();

        let upload = store.write("empty.txt", &b""[..]).await.unwrap();
        let stored = store
            .open(upload.identifier.as_str(), "empty.txt")
            .await
            .unwrap();

        assert_eq!(upload.bytes_written, 0);
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_filename_stays_inside_identifier_directory() {
        let (store, _temp_dir) = create_test_store();

        let upload = store.write("../../escape.txt", &b"data"[..]).await.unwrap();

        assert_eq!(upload.filename, "escape.txt");
        assert!(upload.path.starts_with(store.root().join(upload.identifier.as_str())));
        assert!(!store.root().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_blank_filename_uses_placeholder() {
        let (store, _temp_dir) = create_test_store();

        let upload = store.write("", &b"data"[..]).await.unwrap();

        assert_eq!(upload.filename, "uploaded-file");
    }

    #[tokio::test]
    async fn test_collision_allocates_another_identifier() {
        let (store, _temp_dir) = create_test_store();

        // Same seed as the store, so the first identifier it draws is known.
        let predictor = IdentifierAllocator::new(Arc::new(SeededRandom::new(1)), 6).unwrap();
        let taken = predictor.generate().unwrap();
        fs::create_dir_all(store.root().join(taken.as_str()))
            .await
            .unwrap();

        let upload = store.write("file.txt", &b"new"[..]).await.unwrap();

        assert_ne!(upload.identifier, taken);
        assert_eq!(upload.identifier, predictor.generate().unwrap());
    }

    #[tokio::test]
    async fn test_collisions_exhaust_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let allocator = IdentifierAllocator::new(Arc::new(SeededRandom::new(9)), 6).unwrap();
        let store = FileStore::new(root.clone(), allocator).with_max_allocation_attempts(2);

        let predictor = IdentifierAllocator::new(Arc::new(SeededRandom::new(9)), 6).unwrap();
        for _ in 0..2 {
            let taken = predictor.generate().unwrap();
            std::fs::create_dir_all(root.join(taken.as_str())).unwrap();
        }

        let result = store.write("file.txt", &b"x"[..]).await;

        assert!(matches!(
            result,
            Err(StoreError::IdentifierExhausted { attempts: 2 })
        ));
    }

    #[tokio::test]
    async fn test_allocation_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = IdentifierAllocator::new(Arc::new(FailingRandom), 6).unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf(), allocator);

        let result = store.write("file.txt", &b"x"[..]).await;

        assert!(matches!(result, Err(StoreError::Allocation(_))));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_root_creation_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let allocator = IdentifierAllocator::os(6).unwrap();
        let store = FileStore::new(blocker.join("uploads"), allocator);

        let result = store.write("file.txt", &b"x"[..]).await;

        assert!(matches!(result, Err(StoreError::CreateDirectory { .. })));
    }

    #[tokio::test]
    async fn test_file_creation_failure_is_reported() {
        let (store, _temp_dir) = create_test_store();
        let identifier = IdentifierAllocator::os(6).unwrap().generate().unwrap();
        // A directory squatting on the target filename makes File::create fail.
        fs::create_dir_all(store.path_for(identifier.as_str(), "taken"))
            .await
            .unwrap();

        let result = store.write_as(identifier, "taken", &b"x"[..]).await;

        assert!(matches!(result, Err(StoreError::CreateFile { .. })));
    }

    #[tokio::test]
    async fn test_copy_failure_removes_partial_upload() {
        let (store, _temp_dir) = create_test_store();

        let result = store
            .write("upload.bin", BrokenStream { sent: false })
            .await;

        let (path, source) = match result {
            Err(StoreError::CopyFailed { path, source }) => (path, source),
            other => panic!("expected copy failure, got {other:?}"),
        };
        assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_file_creation_failure_removes_identifier_directory() {
        let (store, _temp_dir) = create_test_store();
        let overlong = "a".repeat(300);

        let result = store.write(&overlong, &b"x"[..]).await;

        assert!(matches!(result, Err(StoreError::CreateFile { .. })));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_as_overwrites_existing_file() {
        let (store, _temp_dir) = create_test_store();
        let identifier = IdentifierAllocator::os(6).unwrap().generate().unwrap();

        store
            .write_as(identifier.clone(), "same.txt", &b"first version"[..])
            .await
            .unwrap();
        store
            .write_as(identifier.clone(), "same.txt", &b"second"[..])
            .await
            .unwrap();

        assert_eq!(
            read_back(&store, identifier.as_str(), "same.txt").await,
            b"second"
        );
    }

    #[tokio::test]
    async fn test_open_missing_pair_is_not_found() {
        let (store, _temp_dir) = create_test_store();

        let result = store.open("abc123", "missing.txt").await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_open_directory_is_not_found() {
        let (store, _temp_dir) = create_test_store();
        let upload = store.write("file.txt", &b"x"[..]).await.unwrap();

        // identifier directory addressed as a file
        fs::create_dir_all(upload.path.with_file_name("subdir"))
            .await
            .unwrap();
        let result = store.open(upload.identifier.as_str(), "subdir").await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_open_rejects_traversal_segments() {
        let (store, temp_dir) = create_test_store();
        std::fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();
        store.write("file.txt", &b"x"[..]).await.unwrap();

        for (identifier, filename) in [
            ("..", "secret.txt"),
            ("abc", "../../secret.txt"),
            ("", "secret.txt"),
            ("abc", ".."),
        ] {
            let result = store.open(identifier, filename).await;
            assert!(
                matches!(result, Err(StoreError::NotFound { .. })),
                "{identifier}/{filename} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_open_under_file_identifier_is_not_found() {
        let (store, _temp_dir) = create_test_store();
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.root().join("plainfile"), b"x").unwrap();

        let result = store.open("plainfile", "child.txt").await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_overlong_segments_are_not_found() {
        let (store, _temp_dir) = create_test_store();
        let upload = store.write("file.txt", &b"x"[..]).await.unwrap();
        let overlong = "b".repeat(300);

        for (identifier, filename) in [
            (overlong.as_str(), "file.txt"),
            (upload.identifier.as_str(), overlong.as_str()),
        ] {
            let result = store.open(identifier, filename).await;
            assert!(matches!(result, Err(StoreError::NotFound { .. })));
        }
    }

    #[test]
    fn test_refused_names_count_as_absent() {
        assert!(is_absent(&io::Error::from(io::ErrorKind::InvalidFilename)));
        assert!(is_absent(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_absent(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_locate_returns_stored_path() {
        let (store, _temp_dir) = create_test_store();
        let upload = store.write("file.txt", &b"x"[..]).await.unwrap();

        let path = store
            .locate(upload.identifier.as_str(), "file.txt")
            .await
            .unwrap();

        assert_eq!(path, upload.path);
        assert!(matches!(
            store.locate(upload.identifier.as_str(), "other.txt").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_size_limit_detection() {
        let error = StoreError::CopyFailed {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::FileTooLarge, "limit"),
        };
        assert!(error.is_size_limit());

        let error = StoreError::CopyFailed {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::other("reset"),
        };
        assert!(!error.is_size_limit());
    }
}
