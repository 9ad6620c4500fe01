//! In-memory object storage used by tests

use crate::storage::{validate_object_name, ObjectReader, StagedWrite, Storage, StorageError};
use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

type Objects = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Default)]
pub struct MockObjectStore {
    objects: Objects,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::io("lock mock store", io::Error::new(io::ErrorKind::Other, "poisoned")))
    }
}

impl Storage for MockObjectStore {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        validate_object_name(name)?;
        Ok(self.lock()?.contains_key(name))
    }

    fn open(&self, name: &str) -> Result<ObjectReader, StorageError> {
        validate_object_name(name)?;
        let data = self
            .lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(ObjectReader {
            size: data.len() as u64,
            reader: Box::new(Cursor::new(data)),
        })
    }

    fn stage(&self, name: &str) -> Result<Box<dyn StagedWrite>, StorageError> {
        validate_object_name(name)?;
        Ok(Box::new(MockStagedWrite {
            objects: Arc::clone(&self.objects),
            name: name.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        validate_object_name(name)?;
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

struct MockStagedWrite {
    objects: Objects,
    name: String,
    buffer: Vec<u8>,
}

impl Write for MockStagedWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StagedWrite for MockStagedWrite {
    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MockStagedWrite { objects, name, buffer } = *self;
        let mut objects = objects
            .lock()
            .map_err(|_| StorageError::io("lock mock store", io::Error::new(io::ErrorKind::Other, "poisoned")))?;
        objects.insert(name, buffer);
        Ok(())
    }
}
