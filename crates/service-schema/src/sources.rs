//! Source files of a service description, and locations within them.
//!
//! The front end that produced a [`ServiceDescriptor`][crate::ServiceDescriptor]
//! attaches the source text it read so that diagnostics can print labeled snippets
//! and generated types can carry a [`Position`][crate::schema::Position].

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::sync::OnceLock;

/// Integer identifier for a source file.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId {
    id: u64,
}

pub type SourceMap = Arc<IndexMap<FileId, Arc<SourceFile>>>;

/// A span of UTF-8 bytes in one source file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeLocation {
    pub file_id: FileId,
    pub start: usize,
    pub end: usize,
}

/// A line and column, both 1-based, as found in GraphQL error locations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

/// The text of one source file of a service.
#[derive(Clone)]
pub struct SourceFile {
    path: PathBuf,
    source_text: String,
    mapped: OnceLock<MappedSource>,
}

/// Translate byte offsets to ariadne's char offsets.
#[derive(Clone)]
pub(crate) struct MappedSource {
    ariadne: ariadne::Source,
    map: Vec<u32>,
}

impl FileId {
    /// Used for locations that do not belong to any file.
    pub const NONE: Self = Self { id: 0 };

    /// Returns a new, unique file ID
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT.fetch_add(1, atomic::Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

impl NodeLocation {
    pub fn new(file_id: FileId, start: usize, end: usize) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Line and column of the start of this span
    pub fn line_column(&self, sources: &SourceMap) -> Option<LineColumn> {
        sources.get(&self.file_id)?.line_column(self.start)
    }

    /// Line and column of the end of this span
    pub fn end_line_column(&self, sources: &SourceMap) -> Option<LineColumn> {
        sources.get(&self.file_id)?.line_column(self.end)
    }
}

impl MappedSource {
    fn new(input: &str) -> Self {
        let ariadne = ariadne::Source::from(input);

        let mut map = vec![0; input.len() + 1];
        let mut char_index = 0;
        for (byte_index, _) in input.char_indices() {
            map[byte_index] = char_index;
            char_index += 1;
        }
        // one past the end, for exclusive ranges
        map[input.len()] = char_index;

        Self { ariadne, map }
    }

    pub(crate) fn map_index(&self, byte_index: usize) -> usize {
        let last = self.map.len().saturating_sub(1);
        self.map[byte_index.min(last)] as usize
    }
}

impl SourceFile {
    pub fn new(path: impl AsRef<Path>, source_text: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            source_text: source_text.into(),
            mapped: OnceLock::new(),
        }
    }

    /// The filesystem path (or arbitrary string) used in diagnostics
    /// to identify this source file to users.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub(crate) fn ariadne(&self) -> &ariadne::Source {
        &self.mapped_source().ariadne
    }

    pub(crate) fn mapped_source(&self) -> &MappedSource {
        self.mapped
            .get_or_init(|| MappedSource::new(&self.source_text))
    }

    /// 1-based line and column of a byte offset
    pub fn line_column(&self, byte_index: usize) -> Option<LineColumn> {
        let char_index = self.mapped_source().map_index(byte_index);
        let (_, line, column) = self.ariadne().get_offset_line(char_index)?;
        Some(LineColumn {
            line: line + 1,
            column: column + 1,
        })
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            path,
            source_text,
            mapped: _, // a cache
        } = self;
        f.debug_struct("SourceFile")
            .field("path", path)
            .field("source_text", source_text)
            .finish()
    }
}

/// Builds a [`SourceMap`] from `(path, text)` pairs, returning the assigned IDs in order.
pub fn source_map<I, P, S>(files: I) -> (SourceMap, Vec<FileId>)
where
    I: IntoIterator<Item = (P, S)>,
    P: AsRef<Path>,
    S: Into<String>,
{
    let mut map = IndexMap::new();
    let mut ids = Vec::new();
    for (path, text) in files {
        let id = FileId::new();
        map.insert(id, Arc::new(SourceFile::new(path, text)));
        ids.push(id);
    }
    (Arc::new(map), ids)
}
