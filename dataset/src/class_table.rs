use crate::common::*;

/// Sentinel id returned for class names absent from the table.
pub const UNKNOWN_CLASS_ID: i64 = -1;

/// Positional class-name to id lookup table.
///
/// Ids follow the position of each name in the class list, 0-based. The
/// table is immutable after construction and safe to share across decode
/// operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    classes: IndexSet<String>,
}

impl ClassTable {
    pub fn new(names: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut classes = IndexSet::new();
        for name in names {
            ensure!(classes.insert(name.clone()), "duplicated class name '{}'", name);
        }
        ensure!(!classes.is_empty(), "no class names given");
        Ok(Self { classes })
    }

    /// Load a class file, one name per record with the given separator.
    ///
    /// Empty segments (such as the one after a trailing newline) are
    /// skipped; a `\r` left by CRLF files is trimmed.
    pub fn from_file(path: impl AsRef<Path>, delimiter: char) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class file '{}'", path.display()))?;
        let names = content
            .split(delimiter)
            .map(|name| name.trim_end_matches('\r'))
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned);
        Self::new(names).with_context(|| format!("bad class file '{}'", path.display()))
    }

    /// Resolve a class name to its id, or [`UNKNOWN_CLASS_ID`] if absent.
    pub fn lookup(&self, name: &str) -> i64 {
        self.classes
            .get_index_of(name)
            .map(|index| index as i64)
            .unwrap_or(UNKNOWN_CLASS_ID)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class names in id order.
    pub fn classes(&self) -> &IndexSet<String> {
        &self.classes
    }
}
