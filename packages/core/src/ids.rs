//! Id generators for elements created by edits.
//!
//! Generators are plain values passed to the edit functions, so parallel
//! batch jobs never share state and tests can pin ids down.
//!
//! | Generator | Example id |
//! |-----------|------------|
//! | [`SequentialIds`] | `e1`, `e2`, … |
//! | [`Uuid7Ids`] | `019526b2-f68a-7c3e-a0b4-1d2e3f4a5b6c` |
//! | [`StampedIds`] | `stac_1708257600000` (annotator, epoch millis) |

/// A source of fresh element ids.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// `prefix1`, `prefix2`, …
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// Time-ordered UUIDv7 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uuid7Ids;

impl IdGenerator for Uuid7Ids {
    fn next_id(&mut self) -> String {
        uuid::Uuid::now_v7().to_string()
    }
}

/// `author_millis` ids in the style of the annotation tool.
///
/// The millisecond stamp is forced to increase strictly, so two ids minted
/// within the same millisecond still differ.
#[derive(Debug, Clone)]
pub struct StampedIds {
    author: String,
    last: i64,
}

impl StampedIds {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            last: 0,
        }
    }
}

impl IdGenerator for StampedIds {
    fn next_id(&mut self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        format!("{}_{}", self.author, self.last)
    }
}
