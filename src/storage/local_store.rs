//! Local filesystem object storage

use crate::storage::{validate_object_name, ObjectReader, StagedWrite, Storage, StorageError};
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores each object as one file directly under `root`.
pub struct LocalFileStore {
    root: PathBuf,
}

const STAGING_SUFFIX: &str = ".part";

impl LocalFileStore {
    /// Opens the store and discards staging files left by an interrupted
    /// process. Those names start with `.`, so the API can never reach them.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using local storage directory: {}", root.display());
        let store = Self { root };
        store.sweep_staging();
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_object_name(name)?;
        Ok(self.root.join(name))
    }

    /// Remove leftover `.<name>.<id>.part` files. Returns how many went.
    pub fn sweep_staging(&self) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot scan {} for staging files: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let is_staging = name
                .to_str()
                .map_or(false, |n| n.starts_with('.') && n.ends_with(STAGING_SUFFIX));
            if !is_staging || !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale staging file {}: {}", entry.path().display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} stale staging file(s) from {}", removed, self.root.display());
        }
        removed
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .map_err(|e| StorageError::io("create storage directory", e))?;
            info!("Created storage directory: {}", self.root.display());
        }
        Ok(())
    }
}

impl Storage for LocalFileStore {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.object_path(name)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io("stat object", e)),
        }
    }

    fn open(&self, name: &str) -> Result<ObjectReader, StorageError> {
        let path = self.object_path(name)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::io("open object", e),
        })?;
        let meta = file
            .metadata()
            .map_err(|e| StorageError::io("stat object", e))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(ObjectReader {
            reader: Box::new(file),
            size: meta.len(),
        })
    }

    fn stage(&self, name: &str) -> Result<Box<dyn StagedWrite>, StorageError> {
        let target = self.object_path(name)?;
        self.ensure_root()?;

        // Hidden sibling so the final rename stays on one filesystem.
        let temp = self
            .root
            .join(format!(".{}.{}{}", name, Uuid::new_v4().simple(), STAGING_SUFFIX));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .map_err(|e| StorageError::io("create file", e))?;
        debug!("Staging {} at {}", name, temp.display());

        Ok(Box::new(StagedFile {
            file: Some(file),
            temp,
            target,
        }))
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::io("remove file", e),
        })
    }
}

/// Temporary file renamed over the target on commit.
struct StagedFile {
    file: Option<File>,
    temp: PathBuf,
    target: PathBuf,
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "staged file already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl StagedWrite for StagedFile {
    fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|e| StorageError::io("save file", e))?;
        }
        fs::rename(&self.temp, &self.target).map_err(|e| StorageError::io("save file", e))?;
        debug!("Committed {}", self.target.display());
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // After a successful commit the temp path no longer exists.
        if self.temp.exists() {
            drop(self.file.take());
            if let Err(e) = fs::remove_file(&self.temp) {
                warn!("Failed to discard staged file {}: {}", self.temp.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_all(store: &LocalFileStore, name: &str) -> Vec<u8> {
        let mut obj = store.open(name).unwrap();
        let mut buf = Vec::new();
        obj.reader.read_to_end(&mut buf).unwrap();
        assert_eq!(obj.size, buf.len() as u64);
        buf
    }

    fn write(store: &LocalFileStore, name: &str, data: &[u8]) {
        let mut staged = store.stage(name).unwrap();
        staged.write_all(data).unwrap();
        staged.commit().unwrap();
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_stage_creates_missing_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("uploads");
        let store = LocalFileStore::new(&root);
        assert_eq!(store.root(), root.as_path());

        write(&store, "a.jpg", b"hello");

        assert!(root.is_dir());
        assert_eq!(read_all(&store, "a.jpg"), b"hello");
        assert_eq!(entries(&root), vec!["a.jpg".to_string()]);
    }

    #[test]
    fn test_commit_replaces_whole_content() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());

        write(&store, "a.bin", b"a much longer first version");
        write(&store, "a.bin", b"short");

        assert_eq!(read_all(&store, "a.bin"), b"short");
    }

    #[test]
    fn test_uncommitted_write_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());
        write(&store, "keep.txt", b"original");

        {
            let mut staged = store.stage("keep.txt").unwrap();
            staged.write_all(b"partial").unwrap();
        }

        assert_eq!(read_all(&store, "keep.txt"), b"original");
        assert_eq!(entries(tmp.path()), vec!["keep.txt".to_string()]);
    }

    #[test]
    fn test_open_sweeps_stale_staging_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".x.jpg.0123abcd.part"), b"interrupted").unwrap();
        fs::write(tmp.path().join("x.jpg"), b"committed").unwrap();
        fs::write(tmp.path().join("notes.part"), b"ordinary object").unwrap();

        let store = LocalFileStore::new(tmp.path());

        assert_eq!(
            entries(tmp.path()),
            vec!["notes.part".to_string(), "x.jpg".to_string()]
        );
        assert_eq!(read_all(&store, "x.jpg"), b"committed");
        assert_eq!(store.sweep_staging(), 0);
    }

    #[test]
    fn test_exists_and_remove() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());

        assert!(!store.exists("gone.png").unwrap());
        write(&store, "gone.png", b"x");
        assert!(store.exists("gone.png").unwrap());

        store.remove("gone.png").unwrap();
        assert!(!store.exists("gone.png").unwrap());
        assert!(matches!(store.remove("gone.png"), Err(StorageError::NotFound(_))));
        assert!(matches!(store.open("gone.png"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_exists_on_missing_root() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().join("never-created"));
        assert!(!store.exists("a.jpg").unwrap());
    }

    #[test]
    fn test_rejects_names_outside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("uploads");
        fs::create_dir_all(&root).unwrap();
        fs::write(tmp.path().join("secret.txt"), b"do not serve").unwrap();
        let store = LocalFileStore::new(&root);

        assert!(matches!(store.open("../secret.txt"), Err(StorageError::InvalidName(_))));
        assert!(matches!(store.remove("../secret.txt"), Err(StorageError::InvalidName(_))));
        assert!(store.stage("../escape.txt").is_err());
        assert!(tmp.path().join("secret.txt").exists());
    }
}
