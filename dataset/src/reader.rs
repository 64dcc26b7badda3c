use crate::{
    class_table::ClassTable,
    codec::{decode_example, DecodeConfig, DecodedRecord},
    common::*,
};
use record::RecordReader;

/// Lazily decoded dataset over one or more record containers.
///
/// Containers are immutable once written, so [`stream`](DatasetReader::stream)
/// is restartable: every call yields the same sequence from the start, in
/// container write order.
#[derive(Debug)]
pub struct DatasetReader {
    files: Vec<PathBuf>,
    classes: ClassTable,
    config: DecodeConfig,
}

impl DatasetReader {
    /// Resolve `pattern` to containers and build the class table from
    /// `classes_file`, one class per line.
    pub fn open(
        pattern: &str,
        classes_file: impl AsRef<Path>,
        config: DecodeConfig,
    ) -> Result<Self> {
        Self::open_with_delimiter(pattern, classes_file, '\n', config)
    }

    /// [`open`](DatasetReader::open) with a custom class file separator.
    pub fn open_with_delimiter(
        pattern: &str,
        classes_file: impl AsRef<Path>,
        delimiter: char,
        config: DecodeConfig,
    ) -> Result<Self> {
        let classes = ClassTable::from_file(classes_file, delimiter)?;

        let mut files: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("bad container pattern '{}'", pattern))?
            .try_collect()
            .with_context(|| format!("failed to resolve pattern '{}'", pattern))?;
        files.sort();
        ensure!(!files.is_empty(), "no container matches '{}'", pattern);
        info!("opened {} container(s) matching '{}'", files.len(), pattern);

        Ok(Self {
            files,
            classes,
            config,
        })
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Start a fresh decoding pass over the containers.
    pub fn stream(&self) -> DatasetStream<'_> {
        DatasetStream {
            classes: &self.classes,
            config: &self.config,
            files: self.files.iter(),
            current: None,
            index: 0,
        }
    }
}

/// Pull-based iterator over decoded records.
///
/// Holds at most one container handle at a time; dropping the stream closes
/// it. A decode failure is fatal to that record and yielded as an error; a
/// corrupt container entry also ends that container's records.
#[derive(Debug)]
pub struct DatasetStream<'a> {
    classes: &'a ClassTable,
    config: &'a DecodeConfig,
    files: std::slice::Iter<'a, PathBuf>,
    current: Option<(&'a Path, RecordReader<BufReader<File>>)>,
    index: usize,
}

impl DatasetStream<'_> {
    fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        loop {
            let (path, reader) = match &mut self.current {
                Some((path, reader)) => (*path, reader),
                None => match self.files.next() {
                    Some(path) => {
                        let reader = RecordReader::open(path)?;
                        self.current = Some((path.as_path(), reader));
                        continue;
                    }
                    None => return Ok(None),
                },
            };

            match reader.next() {
                Some(raw) => {
                    let raw = raw
                        .with_context(|| format!("in container '{}'", path.display()))?;
                    let record = decode_example(raw, self.classes, self.config)
                        .with_context(|| {
                            format!(
                                "failed to decode record {} of container '{}'",
                                self.index,
                                path.display()
                            )
                        })?;
                    self.index += 1;
                    return Ok(Some(record));
                }
                None => {
                    self.current = None;
                }
            }
        }
    }
}

impl Iterator for DatasetStream<'_> {
    type Item = Result<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
