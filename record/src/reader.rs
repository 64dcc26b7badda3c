use crate::{common::*, error::malformed, example::RawExample, wire};

/// Sequential container reader.
///
/// Pulls records in write order. A parse or checksum failure is fatal to the
/// iteration; the error names the record index and byte offset of the
/// failing entry.
#[derive(Debug)]
pub struct RecordReader<R>
where
    R: Read,
{
    reader: R,
    index: usize,
    offset: u64,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open container '{}'", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> RecordReader<R>
where
    R: Read,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            index: 0,
            offset: 0,
            done: false,
        }
    }

    /// The number of records read so far.
    pub fn records_read(&self) -> usize {
        self.index
    }

    fn read_record(&mut self) -> Result<Option<RawExample>> {
        let mut len_buf = [0u8; 8];
        if !fill_or_eof(&mut self.reader, &mut len_buf)? {
            return Ok(None);
        }

        let len = u64::from_le_bytes(len_buf);
        if len > wire::MAX_PAYLOAD_BYTES {
            return Err(malformed(format!("record claims {} payload bytes", len)));
        }

        let mut crc_buf = [0u8; 4];
        self.reader
            .read_exact(&mut crc_buf)
            .map_err(|_| malformed("truncated record frame"))?;
        let expected_crc = u32::from_le_bytes(crc_buf);

        let mut payload = vec![0u8; len as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|_| malformed("truncated record payload"))?;

        if wire::checksum(&payload) != expected_crc {
            return Err(malformed("record checksum mismatch"));
        }

        let example = wire::decode_payload(&payload)?;
        self.offset += 8 + 4 + len;
        self.index += 1;
        Ok(Some(example))
    }
}

impl<R> Iterator for RecordReader<R>
where
    R: Read,
{
    type Item = Result<RawExample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(example)) => Some(Ok(example)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err.context(format!(
                    "record {} at byte offset {}",
                    self.index, self.offset
                ))))
            }
        }
    }
}

/// Fill `buf` from `reader`. `Ok(false)` on a clean end of stream before the
/// first byte; a partial fill is a truncation error.
fn fill_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..])?;
        if read == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(malformed("truncated record length"));
        }
        filled += read;
    }
    Ok(true)
}
