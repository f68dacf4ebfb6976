use crate::StorageError;

/// Growable buffer for one JSON reply body with a hard size ceiling.
///
/// Appends are all-or-nothing: text that would push the buffer past
/// `max_bytes` is rejected whole and the buffer remembers that content was
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyBuffer {
    content: String,
    max_bytes: usize,
    dropped_content: bool,
}

impl ReplyBuffer {
    /// Creates an empty buffer limited to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            content: String::new(),
            max_bytes,
            dropped_content: false,
        }
    }

    /// Creates a buffer seeded with `prefix`.
    pub fn with_prefix(max_bytes: usize, prefix: &str) -> Result<Self, StorageError> {
        let mut buffer = Self::new(max_bytes);
        buffer.push_str(prefix)?;
        Ok(buffer)
    }

    /// Appends `text` if it fits.
    pub fn push_str(&mut self, text: &str) -> Result<(), StorageError> {
        self.push_str_reserving(text, 0)
    }

    /// Appends `text` only if `reserved` bytes remain free afterwards.
    pub fn push_str_reserving(&mut self, text: &str, reserved: usize) -> Result<(), StorageError> {
        let needed = self
            .content
            .len()
            .saturating_add(text.len())
            .saturating_add(reserved);
        if needed > self.max_bytes {
            self.dropped_content = true;
            return Err(StorageError::ReplyOverflow {
                needed,
                max: self.max_bytes,
            });
        }
        self.content.push_str(text);
        Ok(())
    }

    /// Appends every fragment, or none of them.
    pub fn push_all_reserving(
        &mut self,
        fragments: &[&str],
        reserved: usize,
    ) -> Result<(), StorageError> {
        let total = fragments
            .iter()
            .fold(0usize, |sum, fragment| sum.saturating_add(fragment.len()));
        let needed = self
            .content
            .len()
            .saturating_add(total)
            .saturating_add(reserved);
        if needed > self.max_bytes {
            self.dropped_content = true;
            return Err(StorageError::ReplyOverflow {
                needed,
                max: self.max_bytes,
            });
        }
        for fragment in fragments {
            self.content.push_str(fragment);
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        self.content.as_str()
    }

    pub fn into_string(self) -> String {
        self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Returns true when at least one append was rejected.
    pub fn dropped_content(&self) -> bool {
        self.dropped_content
    }
}
