use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use keyless_codec::{tlv::Reader, Element, Fragment};
use keyless_primitives::{
    tags, AggregationHashChain, CalendarAuthRecord, CalendarHashChain, PublicationRecord,
    Rfc3161Record,
};
use tracing::{trace, warn};

use crate::{Error, WriteMode};

/// Prefix of every container image
pub const MAGIC: &[u8; 8] = b"MULTISIG";

/// Destination of the container image, rewritten whole on every mutation
pub trait Sink: Send {
    fn write_image(&mut self, image: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    mode: WriteMode,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Sink for FileSink {
    fn write_image(&mut self, image: &[u8]) -> io::Result<()> {
        match self.mode {
            WriteMode::Truncate => fs::write(&self.path, image),
            WriteMode::Atomic => {
                let temp = self.temp_path();

                let mut file = File::create(&temp)?;
                file.write_all(image)?;
                file.sync_all()?;
                drop(file);

                fs::rename(&temp, &self.path)?;

                sync_parent_dir(&self.path)
            }
        }
    }
}

/// Flushes the directory entry of `path` so a completed rename survives a crash
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(x) if !x.as_os_str().is_empty() => x,
        _ => Path::new("."),
    };

    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_: &Path) -> io::Result<()> {
    Ok(())
}

/// Keeps the last image in memory; clones share it
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn image(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Sink for MemorySink {
    fn write_image(&mut self, image: &[u8]) -> io::Result<()> {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        guard.clear();
        guard.extend_from_slice(image);

        Ok(())
    }
}

/// Decoded content of a container image, grouped by record kind
#[derive(Debug, Default)]
pub(crate) struct Image {
    pub aggregation_chains: Vec<AggregationHashChain>,
    pub calendar_chains: Vec<CalendarHashChain>,
    pub auth_records: Vec<CalendarAuthRecord>,
    pub publication_records: Vec<PublicationRecord>,
    pub rfc3161_records: Vec<Rfc3161Record>,
}

impl Image {
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut magic = [0u8; 8];

        reader.read_exact(&mut magic).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::BadMagic,
            _ => Error::Io(err),
        })?;

        if &magic != MAGIC {
            return Err(Error::BadMagic);
        }

        let mut image = Image::default();

        for element in Reader::new(reader) {
            let element = element?;
            trace!(tag = element.tag(), len = element.content().len(), "record");

            match element.tag() {
                tags::AGGREGATION_CHAIN => image
                    .aggregation_chains
                    .push(AggregationHashChain::decode_element(&element)?),
                tags::CALENDAR_CHAIN => image
                    .calendar_chains
                    .push(CalendarHashChain::decode_element(&element)?),
                tags::CALENDAR_AUTH_RECORD => image
                    .auth_records
                    .push(CalendarAuthRecord::decode_element(&element)?),
                tags::PUBLICATION_RECORD => image
                    .publication_records
                    .push(PublicationRecord::decode_element(&element)?),
                tags::RFC3161_RECORD => image
                    .rfc3161_records
                    .push(Rfc3161Record::decode_element(&element)?),
                tag => warn!(tag, "dropping unknown container record"),
            }
        }

        Ok(image)
    }
}

/// Writes the magic followed by every record, in the order given
pub(crate) fn write_image<W, I>(writer: &mut W, records: I) -> Result<(), Error>
where
    W: Write,
    I: IntoIterator<Item = Result<Element, keyless_codec::Error>>,
{
    writer.write_all(MAGIC)?;

    for record in records {
        record?.write_to(writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_not_a_container() {
        assert!(matches!(Image::read_from(&b""[..]), Err(Error::BadMagic)));
        assert!(matches!(Image::read_from(&b"MULTI"[..]), Err(Error::BadMagic)));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        assert!(matches!(
            Image::read_from(&b"KSIPUBLF"[..]),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn unknown_records_are_dropped() {
        let mut bytes = MAGIC.to_vec();
        Element::new(0x0123, vec![1, 2, 3])
            .write_to(&mut bytes)
            .unwrap();

        let image = Image::read_from(bytes.as_slice()).unwrap();
        assert!(image.aggregation_chains.is_empty());
        assert!(image.calendar_chains.is_empty());
    }

    #[test]
    fn truncated_record_fails() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0x88, 0x01, 0x00, 0x10, 0x01]);

        assert!(matches!(
            Image::read_from(bytes.as_slice()),
            Err(Error::Codec(keyless_codec::Error::Truncated))
        ));
    }

    #[test]
    fn memory_sink_keeps_last_image() {
        let sink = MemorySink::default();
        let mut writer = sink.clone();

        writer.write_image(b"first").unwrap();
        writer.write_image(b"2nd").unwrap();

        assert_eq!(sink.image(), b"2nd");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.bin");

        let mut sink = FileSink::new(&path, WriteMode::Atomic);
        sink.write_image(b"one").unwrap();
        sink.write_image(b"two").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("container.bin.tmp").exists());
    }

    #[test]
    fn parent_dir_sync_accepts_bare_file_names() {
        let dir = tempfile::tempdir().unwrap();

        sync_parent_dir(&dir.path().join("container.bin")).unwrap();
        sync_parent_dir(Path::new("container.bin")).unwrap();
    }
}
