//! In-memory model of a 7z header and its encoder.
//!
//! The model covers what a non-encrypted archive can carry in its main
//! header: pack sizes, folders with arbitrary coder graphs, substreams and
//! per-file metadata. Archives being appended to are parsed into the same
//! model, so their structure is re-emitted as found.

use crate::format::bytes::{write_all_or_bits, write_bool_vector, write_number};
use crate::format::property_id;
use crate::{Error, Result};

/// One coder in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Coder {
    pub method_id: Vec<u8>,
    pub num_in_streams: u64,
    pub num_out_streams: u64,
    pub properties: Option<Vec<u8>>,
}

impl Coder {
    /// A single-input single-output coder.
    pub(crate) fn simple(method_id: &[u8], properties: Option<Vec<u8>>) -> Self {
        Self {
            method_id: method_id.to_vec(),
            num_in_streams: 1,
            num_out_streams: 1,
            properties,
        }
    }

    fn is_simple(&self) -> bool {
        self.num_in_streams == 1 && self.num_out_streams == 1
    }
}

/// Connects a coder input to another coder's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BindPair {
    pub in_index: u64,
    pub out_index: u64,
}

/// A folder: a coder graph turning packed streams into one unpacked stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Folder {
    pub coders: Vec<Coder>,
    pub bind_pairs: Vec<BindPair>,
    pub packed_streams: Vec<u64>,
    /// One size per coder output.
    pub unpack_sizes: Vec<u64>,
    pub crc: Option<u32>,
}

impl Folder {
    pub(crate) fn total_in_streams(&self) -> Result<u64> {
        checked_sum(self.coders.iter().map(|c| c.num_in_streams))
    }

    pub(crate) fn total_out_streams(&self) -> Result<u64> {
        checked_sum(self.coders.iter().map(|c| c.num_out_streams))
    }

    /// Size of the output not consumed by a bind pair.
    pub(crate) fn final_unpack_size(&self) -> Option<u64> {
        (0..self.unpack_sizes.len() as u64)
            .find(|&i| !self.bind_pairs.iter().any(|bp| bp.out_index == i))
            .map(|i| self.unpack_sizes[i as usize])
    }

    /// Returns the coder of a single-coder folder.
    pub(crate) fn single_coder(&self) -> Option<&Coder> {
        match self.coders.as_slice() {
            [coder] if coder.is_simple() => Some(coder),
            _ => None,
        }
    }
}

/// Sums header values, failing on overflow.
pub(crate) fn checked_sum(values: impl IntoIterator<Item = u64>) -> Result<u64> {
    values
        .into_iter()
        .try_fold(0u64, u64::checked_add)
        .ok_or_else(|| Error::InvalidFormat("7z sizes overflow".into()))
}

/// Metadata of one file record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileRecord {
    pub name: String,
    pub has_stream: bool,
    pub is_dir: bool,
    pub is_anti: bool,
    pub attributes: Option<u32>,
    pub ctime: Option<u64>,
    pub atime: Option<u64>,
    pub mtime: Option<u64>,
}

/// Everything the main header describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArchiveModel {
    /// Offset of the first packed stream after the signature header.
    pub pack_pos: u64,
    pub pack_sizes: Vec<u64>,
    pub folders: Vec<Folder>,
    /// Unpacked streams per folder; 1 for every non-solid folder.
    pub streams_per_folder: Vec<u64>,
    /// Size of every unpacked stream, in folder order.
    pub stream_sizes: Vec<u64>,
    /// CRC of every unpacked stream, in folder order.
    pub stream_crcs: Vec<Option<u32>>,
    pub files: Vec<FileRecord>,
}

impl ArchiveModel {
    /// Offset, relative to the end of the signature header, where the next
    /// packed stream goes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the sizes overflow.
    pub(crate) fn packed_end(&self) -> Result<u64> {
        checked_sum(std::iter::once(self.pack_pos).chain(self.pack_sizes.iter().copied()))
    }

    /// Registers one non-solid folder holding a single stream.
    pub(crate) fn push_stream(&mut self, coder: Coder, packed_size: u64, size: u64, crc: u32) {
        let pack_index = self.pack_sizes.len() as u64;
        self.pack_sizes.push(packed_size);
        self.folders.push(Folder {
            coders: vec![coder],
            bind_pairs: Vec::new(),
            packed_streams: vec![pack_index],
            unpack_sizes: vec![size],
            crc: Some(crc),
        });
        self.streams_per_folder.push(1);
        self.stream_sizes.push(size);
        self.stream_crcs.push(Some(crc));
    }

    /// Returns `true` when a stream's CRC is not implied by its folder.
    fn stream_needs_digest(&self, folder: usize) -> bool {
        self.streams_per_folder[folder] != 1 || self.folders[folder].crc.is_none()
    }

    /// Encodes the plain main header, starting with the `Header` id.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = vec![property_id::HEADER];
        if !self.folders.is_empty() {
            buf.push(property_id::MAIN_STREAMS_INFO);
            self.encode_pack_info(&mut buf);
            self.encode_unpack_info(&mut buf);
            self.encode_substreams_info(&mut buf);
            buf.push(property_id::END);
        }
        if !self.files.is_empty() {
            self.encode_files_info(&mut buf);
        }
        buf.push(property_id::END);
        buf
    }

    fn encode_pack_info(&self, buf: &mut Vec<u8>) {
        buf.push(property_id::PACK_INFO);
        write_number(buf, self.pack_pos);
        write_number(buf, self.pack_sizes.len() as u64);
        buf.push(property_id::SIZE);
        for &size in &self.pack_sizes {
            write_number(buf, size);
        }
        buf.push(property_id::END);
    }

    fn encode_unpack_info(&self, buf: &mut Vec<u8>) {
        buf.push(property_id::UNPACK_INFO);
        buf.push(property_id::FOLDER);
        write_number(buf, self.folders.len() as u64);
        buf.push(0);
        for folder in &self.folders {
            encode_folder(buf, folder);
        }
        buf.push(property_id::CODERS_UNPACK_SIZE);
        for folder in &self.folders {
            for &size in &folder.unpack_sizes {
                write_number(buf, size);
            }
        }
        let defined: Vec<bool> = self.folders.iter().map(|f| f.crc.is_some()).collect();
        if defined.iter().any(|&d| d) {
            buf.push(property_id::CRC);
            write_all_or_bits(buf, &defined);
            for crc in self.folders.iter().filter_map(|f| f.crc) {
                buf.extend_from_slice(&crc.to_le_bytes());
            }
        }
        buf.push(property_id::END);
    }

    fn encode_substreams_info(&self, buf: &mut Vec<u8>) {
        let solid = self.streams_per_folder.iter().any(|&n| n != 1);
        let mut digests = Vec::new();
        let mut stream = 0;
        for (folder, &count) in self.streams_per_folder.iter().enumerate() {
            let count = count as usize;
            if self.stream_needs_digest(folder) {
                digests.extend_from_slice(&self.stream_crcs[stream..stream + count]);
            }
            stream += count;
        }
        let has_digests = digests.iter().any(Option::is_some);

        // Readers such as libarchive require the block even when it is empty.
        buf.push(property_id::SUBSTREAMS_INFO);
        if solid {
            buf.push(property_id::NUM_UNPACK_STREAM);
            for &count in &self.streams_per_folder {
                write_number(buf, count);
            }
            if self.streams_per_folder.iter().any(|&n| n > 1) {
                buf.push(property_id::SIZE);
                let mut stream = 0;
                for &count in &self.streams_per_folder {
                    let count = count as usize;
                    for &size in &self.stream_sizes[stream..stream + count.saturating_sub(1)] {
                        write_number(buf, size);
                    }
                    stream += count;
                }
            }
        }
        if has_digests {
            buf.push(property_id::CRC);
            let defined: Vec<bool> = digests.iter().map(Option::is_some).collect();
            write_all_or_bits(buf, &defined);
            for crc in digests.iter().flatten() {
                buf.extend_from_slice(&crc.to_le_bytes());
            }
        }
        buf.push(property_id::END);
    }

    fn encode_files_info(&self, buf: &mut Vec<u8>) {
        buf.push(property_id::FILES_INFO);
        write_number(buf, self.files.len() as u64);

        let empty_streams: Vec<bool> = self.files.iter().map(|f| !f.has_stream).collect();
        if empty_streams.iter().any(|&e| e) {
            let mut data = Vec::new();
            write_bool_vector(&mut data, &empty_streams);
            write_property(buf, property_id::EMPTY_STREAM, &data);

            let empties = self.files.iter().filter(|f| !f.has_stream);
            let empty_files: Vec<bool> = empties.clone().map(|f| !f.is_dir).collect();
            if empty_files.iter().any(|&e| e) {
                let mut data = Vec::new();
                write_bool_vector(&mut data, &empty_files);
                write_property(buf, property_id::EMPTY_FILE, &data);
            }
            let anti: Vec<bool> = empties.map(|f| f.is_anti).collect();
            if anti.iter().any(|&a| a) {
                let mut data = Vec::new();
                write_bool_vector(&mut data, &anti);
                write_property(buf, property_id::ANTI, &data);
            }
        }

        let mut names = vec![0u8];
        for file in &self.files {
            for unit in file.name.encode_utf16() {
                names.extend_from_slice(&unit.to_le_bytes());
            }
            names.extend_from_slice(&[0, 0]);
        }
        write_property(buf, property_id::NAME, &names);

        self.encode_times(buf, property_id::CTIME, |f| f.ctime);
        self.encode_times(buf, property_id::ATIME, |f| f.atime);
        self.encode_times(buf, property_id::MTIME, |f| f.mtime);

        let defined: Vec<bool> = self.files.iter().map(|f| f.attributes.is_some()).collect();
        if defined.iter().any(|&d| d) {
            let mut data = Vec::new();
            write_all_or_bits(&mut data, &defined);
            data.push(0);
            for attributes in self.files.iter().filter_map(|f| f.attributes) {
                data.extend_from_slice(&attributes.to_le_bytes());
            }
            write_property(buf, property_id::WIN_ATTRIBUTES, &data);
        }
        buf.push(property_id::END);
    }

    fn encode_times(&self, buf: &mut Vec<u8>, id: u8, get: impl Fn(&FileRecord) -> Option<u64>) {
        let defined: Vec<bool> = self.files.iter().map(|f| get(f).is_some()).collect();
        if !defined.iter().any(|&d| d) {
            return;
        }
        let mut data = Vec::new();
        write_all_or_bits(&mut data, &defined);
        data.push(0);
        for time in self.files.iter().filter_map(&get) {
            data.extend_from_slice(&time.to_le_bytes());
        }
        write_property(buf, id, &data);
    }
}

fn encode_folder(buf: &mut Vec<u8>, folder: &Folder) {
    write_number(buf, folder.coders.len() as u64);
    for coder in &folder.coders {
        let mut flags = coder.method_id.len() as u8;
        if !coder.is_simple() {
            flags |= 0x10;
        }
        if coder.properties.is_some() {
            flags |= 0x20;
        }
        buf.push(flags);
        buf.extend_from_slice(&coder.method_id);
        if !coder.is_simple() {
            write_number(buf, coder.num_in_streams);
            write_number(buf, coder.num_out_streams);
        }
        if let Some(props) = &coder.properties {
            write_number(buf, props.len() as u64);
            buf.extend_from_slice(props);
        }
    }
    for bp in &folder.bind_pairs {
        write_number(buf, bp.in_index);
        write_number(buf, bp.out_index);
    }
    if folder.packed_streams.len() > 1 {
        for &index in &folder.packed_streams {
            write_number(buf, index);
        }
    }
}

fn write_property(buf: &mut Vec<u8>, id: u8, data: &[u8]) {
    buf.push(id);
    write_number(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::method;

    #[test]
    fn test_final_unpack_size_skips_bound_outputs() {
        let folder = Folder {
            coders: vec![
                Coder::simple(&[0x03, 0x03, 0x01, 0x03], None),
                Coder::simple(method::LZMA, Some(vec![0x5D, 0, 0, 1, 0])),
            ],
            bind_pairs: vec![BindPair {
                in_index: 0,
                out_index: 1,
            }],
            packed_streams: vec![1],
            unpack_sizes: vec![100, 100],
            crc: None,
        };
        assert_eq!(folder.final_unpack_size(), Some(100));
        assert!(folder.single_coder().is_none());
        assert_eq!(folder.total_in_streams().unwrap(), 2);
    }

    #[test]
    fn test_encode_empty_file_only() {
        let model = ArchiveModel {
            files: vec![FileRecord {
                name: "e".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let header = model.encode();
        assert_eq!(header[0], property_id::HEADER);
        assert_eq!(header[1], property_id::FILES_INFO);
        assert_eq!(header[2], 1);
        // EmptyStream: one byte of bits, first bit set.
        assert_eq!(&header[3..6], &[property_id::EMPTY_STREAM, 1, 0x80]);
        assert_eq!(&header[6..9], &[property_id::EMPTY_FILE, 1, 0x80]);
        assert_eq!(*header.last().unwrap(), property_id::END);
    }

    #[test]
    fn test_non_solid_streams_write_empty_substreams() {
        let mut model = ArchiveModel::default();
        model.push_stream(Coder::simple(method::COPY, None), 3, 3, 0x1234);
        let header = model.encode();
        // SubStreamsInfo END, StreamsInfo END, Header END.
        assert_eq!(
            &header[header.len() - 4..],
            &[
                property_id::SUBSTREAMS_INFO,
                property_id::END,
                property_id::END,
                property_id::END
            ]
        );
        assert_eq!(model.packed_end().unwrap(), 3);
    }

    #[test]
    fn test_packed_end_overflow() {
        let model = ArchiveModel {
            pack_pos: 1,
            pack_sizes: vec![u64::MAX],
            ..Default::default()
        };
        assert!(matches!(model.packed_end(), Err(Error::InvalidFormat(_))));
        assert!(checked_sum([u64::MAX, 0]).is_ok());
    }
}
