use crate::{common::*, example::RawExample, wire};

/// Sequential, append-only container writer.
///
/// Records are framed with a length and a CRC32 checksum and become visible
/// to readers only after [`finish`](RecordWriter::finish). A write that
/// fails midway leaves no valid container; the caller discards the file.
#[derive(Debug)]
pub struct RecordWriter<W>
where
    W: Write,
{
    writer: W,
    count: usize,
}

impl RecordWriter<BufWriter<File>> {
    /// Create a container file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create container '{}'", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Flush buffered records and sync the file to durable storage.
    pub fn finish(self) -> Result<()> {
        let mut writer = self.writer;
        writer.flush()?;
        writer.into_inner()?.sync_all()?;
        Ok(())
    }
}

impl<W> RecordWriter<W>
where
    W: Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Append one record.
    pub fn push(&mut self, example: &RawExample) -> Result<()> {
        let payload = wire::encode_payload(example)
            .with_context(|| format!("failed to encode record {}", self.count))?;
        self.writer.write_u64::<LittleEndian>(payload.len() as u64)?;
        self.writer
            .write_u32::<LittleEndian>(wire::checksum(&payload))?;
        self.writer.write_all(&payload)?;
        self.count += 1;
        Ok(())
    }

    /// The number of records appended so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
