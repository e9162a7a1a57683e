use tracing::debug;

use stow_types::StoreResult;

use crate::store::BinaryStore;

/// In-memory snapshot: write through a binary session, then read the
/// encoded result back without touching the filesystem.
///
/// The writer is available until the first call to [`MemoryStore::reader`],
/// which encodes it, drops it, and decodes a read-only session.
#[derive(Debug)]
pub struct MemoryStore {
    writer: Option<BinaryStore>,
    reader: Option<BinaryStore>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            writer: Some(BinaryStore::new()),
            reader: None,
        }
    }

    /// The writing session, or `None` once the snapshot has been read.
    pub fn writer(&mut self) -> Option<&mut BinaryStore> {
        self.writer.as_mut()
    }

    /// Finish writing (on first call) and return the reading session.
    pub fn reader(&mut self) -> StoreResult<&mut BinaryStore> {
        let reader = match (self.reader.take(), self.writer.take()) {
            (Some(reader), _) => reader,
            (None, Some(writer)) => {
                let bytes = writer.to_bytes()?;
                debug!(bytes = bytes.len(), "memory snapshot taken");
                BinaryStore::from_bytes(bytes)?
            }
            (None, None) => BinaryStore::from_bytes(Vec::new())?,
        };
        Ok(self.reader.insert(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stow_cursor::{Cursor, CursorExt};

    #[test]
    fn write_then_read() {
        let mut memory = MemoryStore::new();
        let writer = memory.writer().unwrap();
        writer.create_complex("pos").unwrap();
        writer.write_double("x", 1.5).unwrap();
        writer.exit_complex().unwrap();

        let reader = memory.reader().unwrap();
        assert!(reader.is_sealed());
        reader.enter_complex("pos").unwrap();
        assert_eq!(reader.read_double("x").unwrap(), 1.5);
    }

    #[test]
    fn writer_is_gone_after_reading() {
        let mut memory = MemoryStore::new();
        memory.writer().unwrap().write_int("n", 1).unwrap();
        memory.reader().unwrap();
        assert!(memory.writer().is_none());
        // A second call returns the same session.
        assert_eq!(memory.reader().unwrap().read_int("n").unwrap(), 1);
    }
}
