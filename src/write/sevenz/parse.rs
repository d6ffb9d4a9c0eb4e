//! Reads an existing 7z archive back into an [`ArchiveModel`].

use std::io::{Cursor, Read, Seek, SeekFrom};

use super::header::{ArchiveModel, BindPair, Coder, FileRecord, Folder, checked_sum};
use crate::codec;
use crate::format::bytes::{
    read_all_or_bits, read_bool_vector, read_bytes, read_count, read_number, read_u8,
    read_u32_le, read_u64_le,
};
use crate::format::{SIGNATURE, SIGNATURE_HEADER_SIZE, property_id};
use crate::{Error, Result};

const MAX_ENTRIES: usize = 1 << 20;
const MAX_CODERS: usize = 64;
const MAX_CODER_STREAMS: u64 = 64;
const MAX_HEADER_SIZE: u64 = 64 * 1024 * 1024;
const MAX_HEADER_NESTING: usize = 4;

/// Decoded start header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StartHeader {
    pub next_header_offset: u64,
    pub next_header_size: u64,
    pub next_header_crc: u32,
}

impl StartHeader {
    /// Encodes the 32-byte signature header.
    pub(crate) fn encode(&self) -> [u8; SIGNATURE_HEADER_SIZE as usize] {
        let mut tail = [0u8; 20];
        tail[..8].copy_from_slice(&self.next_header_offset.to_le_bytes());
        tail[8..16].copy_from_slice(&self.next_header_size.to_le_bytes());
        tail[16..].copy_from_slice(&self.next_header_crc.to_le_bytes());

        let mut out = [0u8; SIGNATURE_HEADER_SIZE as usize];
        out[..6].copy_from_slice(SIGNATURE);
        out[6..8].copy_from_slice(&crate::format::VERSION);
        out[8..12].copy_from_slice(&crc32fast::hash(&tail).to_le_bytes());
        out[12..].copy_from_slice(&tail);
        out
    }

    fn parse(block: &[u8; SIGNATURE_HEADER_SIZE as usize]) -> Result<Self> {
        if &block[..6] != SIGNATURE {
            return Err(Error::InvalidFormat("missing 7z signature".into()));
        }
        if block[6] != 0 {
            return Err(Error::UnsupportedFeature {
                feature: "7z major version",
            });
        }
        let stored = u32::from_le_bytes([block[8], block[9], block[10], block[11]]);
        if crc32fast::hash(&block[12..]) != stored {
            return Err(Error::InvalidFormat("start header CRC mismatch".into()));
        }
        let mut tail = Cursor::new(&block[12..]);
        Ok(Self {
            next_header_offset: read_u64_le(&mut tail)?,
            next_header_size: read_u64_le(&mut tail)?,
            next_header_crc: read_u32_le(&mut tail)?,
        })
    }
}

/// Reads the signature header and main header of the archive at the start
/// of `r`.
pub(crate) fn read_archive<R: Read + Seek>(r: &mut R) -> Result<ArchiveModel> {
    r.seek(SeekFrom::Start(0))?;
    let mut block = [0u8; SIGNATURE_HEADER_SIZE as usize];
    r.read_exact(&mut block)
        .map_err(|_| Error::InvalidFormat("truncated 7z signature header".into()))?;
    let start = StartHeader::parse(&block)?;
    if start.next_header_size == 0 {
        return Ok(ArchiveModel::default());
    }
    if start.next_header_size > MAX_HEADER_SIZE {
        return Err(Error::InvalidFormat("7z header too large".into()));
    }

    let header_pos = SIGNATURE_HEADER_SIZE
        .checked_add(start.next_header_offset)
        .ok_or_else(|| Error::InvalidFormat("7z header offset overflows".into()))?;
    r.seek(SeekFrom::Start(header_pos))?;
    let raw = read_bytes(r, start.next_header_size as usize)
        .map_err(|_| Error::InvalidFormat("7z header past end of file".into()))?;
    if crc32fast::hash(&raw) != start.next_header_crc {
        return Err(Error::InvalidFormat("7z header CRC mismatch".into()));
    }

    let mut header = raw;
    for _ in 0..MAX_HEADER_NESTING {
        let mut cursor = Cursor::new(header.as_slice());
        match read_u8(&mut cursor)? {
            property_id::HEADER => {
                let model = parse_header(&mut cursor)?;
                if model.packed_end()? > start.next_header_offset {
                    return Err(Error::InvalidFormat(
                        "packed streams run past the 7z header".into(),
                    ));
                }
                return Ok(model);
            }
            property_id::ENCODED_HEADER => {
                let streams = parse_streams_info(&mut cursor)?;
                log::debug!("decoding compressed 7z header");
                header = decode_folder(r, &streams, 0)?;
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected 7z header id {other:#04x}"
                )));
            }
        }
    }
    Err(Error::InvalidFormat("7z header nested too deeply".into()))
}

/// Decodes the whole unpacked output of folder `index`.
pub(crate) fn decode_folder<R: Read + Seek>(
    r: &mut R,
    model: &ArchiveModel,
    index: usize,
) -> Result<Vec<u8>> {
    let folder = model
        .folders
        .get(index)
        .ok_or_else(|| Error::InvalidFormat(format!("folder {index} out of range")))?;
    let coder = folder.single_coder().ok_or(Error::UnsupportedFeature {
        feature: "7z coder chains",
    })?;
    let first_pack: usize = model.folders[..index]
        .iter()
        .map(|f| f.packed_streams.len())
        .sum();
    let packed_size = *model
        .pack_sizes
        .get(first_pack)
        .ok_or_else(|| Error::InvalidFormat("missing pack size".into()))?;
    let offset = checked_sum(
        [SIGNATURE_HEADER_SIZE, model.pack_pos]
            .into_iter()
            .chain(model.pack_sizes[..first_pack].iter().copied()),
    )?;
    let unpack_size = folder
        .final_unpack_size()
        .ok_or_else(|| Error::InvalidFormat("folder has no output".into()))?;

    r.seek(SeekFrom::Start(offset))?;
    let packed = read_bytes(r, packed_size as usize)
        .map_err(|_| Error::InvalidFormat("packed stream past end of file".into()))?;
    let data = codec::decompress(
        &coder.method_id,
        coder.properties.as_deref(),
        &packed,
        unpack_size,
    )?;
    match folder.crc {
        Some(expected) if crc32fast::hash(&data) != expected => Err(Error::InvalidFormat(
            format!("folder {index} CRC mismatch"),
        )),
        _ => Ok(data),
    }
}

fn parse_header(r: &mut Cursor<&[u8]>) -> Result<ArchiveModel> {
    let mut model = ArchiveModel::default();
    loop {
        match read_u8(r)? {
            property_id::END => break,
            property_id::ARCHIVE_PROPERTIES => skip_archive_properties(r)?,
            property_id::ADDITIONAL_STREAMS_INFO => {
                return Err(Error::UnsupportedFeature {
                    feature: "7z additional streams",
                });
            }
            property_id::MAIN_STREAMS_INFO => {
                let files = std::mem::take(&mut model.files);
                model = parse_streams_info(r)?;
                model.files = files;
            }
            property_id::FILES_INFO => model.files = parse_files_info(r)?,
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected property {other:#04x} in 7z header"
                )));
            }
        }
    }

    let streams = model.files.iter().filter(|f| f.has_stream).count();
    if streams != model.stream_sizes.len() {
        return Err(Error::InvalidFormat(format!(
            "{streams} files with data but {} streams",
            model.stream_sizes.len()
        )));
    }
    Ok(model)
}

fn skip_archive_properties(r: &mut Cursor<&[u8]>) -> Result<()> {
    loop {
        if read_u8(r)? == property_id::END {
            return Ok(());
        }
        let size = read_number(r)?;
        r.seek(SeekFrom::Current(size as i64))?;
    }
}

fn parse_streams_info(r: &mut Cursor<&[u8]>) -> Result<ArchiveModel> {
    let mut model = ArchiveModel::default();
    let mut substreams_seen = false;
    loop {
        match read_u8(r)? {
            property_id::END => break,
            property_id::PACK_INFO => parse_pack_info(r, &mut model)?,
            property_id::UNPACK_INFO => parse_unpack_info(r, &mut model)?,
            property_id::SUBSTREAMS_INFO => {
                parse_substreams_info(r, &mut model)?;
                substreams_seen = true;
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected property {other:#04x} in streams info"
                )));
            }
        }
    }
    if !substreams_seen {
        model.streams_per_folder = vec![1; model.folders.len()];
        for folder in &model.folders {
            model.stream_sizes.push(folder.final_unpack_size().unwrap_or(0));
            model.stream_crcs.push(folder.crc);
        }
    }
    Ok(model)
}

fn parse_pack_info(r: &mut Cursor<&[u8]>, model: &mut ArchiveModel) -> Result<()> {
    model.pack_pos = read_number(r)?;
    let count = read_count(r, MAX_ENTRIES)?;
    loop {
        match read_u8(r)? {
            property_id::END => return Ok(()),
            property_id::SIZE => {
                model.pack_sizes = (0..count)
                    .map(|_| read_number(r))
                    .collect::<std::io::Result<_>>()?;
            }
            property_id::CRC => {
                // Packed-stream digests are optional and not re-emitted.
                let defined = read_all_or_bits(r, count)?;
                for _ in defined.iter().filter(|&&d| d) {
                    read_u32_le(r)?;
                }
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected property {other:#04x} in pack info"
                )));
            }
        }
    }
}

fn parse_unpack_info(r: &mut Cursor<&[u8]>, model: &mut ArchiveModel) -> Result<()> {
    if read_u8(r)? != property_id::FOLDER {
        return Err(Error::InvalidFormat("expected folder list".into()));
    }
    let count = read_count(r, MAX_ENTRIES)?;
    if read_u8(r)? != 0 {
        return Err(Error::UnsupportedFeature {
            feature: "external 7z folder data",
        });
    }
    model.folders = (0..count)
        .map(|_| parse_folder(r))
        .collect::<Result<_>>()?;

    if read_u8(r)? != property_id::CODERS_UNPACK_SIZE {
        return Err(Error::InvalidFormat("expected coder unpack sizes".into()));
    }
    for folder in &mut model.folders {
        let outputs = folder.total_out_streams()?;
        folder.unpack_sizes = (0..outputs)
            .map(|_| read_number(r))
            .collect::<std::io::Result<_>>()?;
    }

    loop {
        match read_u8(r)? {
            property_id::END => return Ok(()),
            property_id::CRC => {
                let defined = read_all_or_bits(r, count)?;
                for (folder, defined) in model.folders.iter_mut().zip(defined) {
                    if defined {
                        folder.crc = Some(read_u32_le(r)?);
                    }
                }
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected property {other:#04x} in unpack info"
                )));
            }
        }
    }
}

fn parse_folder(r: &mut Cursor<&[u8]>) -> Result<Folder> {
    let num_coders = read_count(r, MAX_CODERS)?;
    let mut coders = Vec::with_capacity(num_coders);
    for _ in 0..num_coders {
        let flags = read_u8(r)?;
        if flags & 0x80 != 0 {
            return Err(Error::UnsupportedFeature {
                feature: "7z alternative coder methods",
            });
        }
        let method_id = read_bytes(r, (flags & 0x0F) as usize)?;
        let (num_in_streams, num_out_streams) = if flags & 0x10 != 0 {
            (read_number(r)?, read_number(r)?)
        } else {
            (1, 1)
        };
        if num_in_streams > MAX_CODER_STREAMS || num_out_streams > MAX_CODER_STREAMS {
            return Err(Error::InvalidFormat("too many 7z coder streams".into()));
        }
        let properties = if flags & 0x20 != 0 {
            let size = read_count(r, 1 << 16)?;
            Some(read_bytes(r, size)?)
        } else {
            None
        };
        if method_id == codec::method::AES {
            return Err(Error::UnsupportedFeature {
                feature: "encrypted 7z archives",
            });
        }
        coders.push(Coder {
            method_id,
            num_in_streams,
            num_out_streams,
            properties,
        });
    }

    let mut folder = Folder {
        coders,
        bind_pairs: Vec::new(),
        packed_streams: Vec::new(),
        unpack_sizes: Vec::new(),
        crc: None,
    };
    let total_out = folder.total_out_streams()?;
    let total_in = folder.total_in_streams()?;
    if total_out == 0 || total_in == 0 {
        return Err(Error::InvalidFormat("folder without streams".into()));
    }
    for _ in 0..total_out - 1 {
        folder.bind_pairs.push(BindPair {
            in_index: read_number(r)?,
            out_index: read_number(r)?,
        });
    }
    let num_packed = total_in
        .checked_sub(folder.bind_pairs.len() as u64)
        .ok_or_else(|| Error::InvalidFormat("too many bind pairs".into()))?;
    if num_packed == 1 {
        let index = (0..total_in)
            .find(|&i| !folder.bind_pairs.iter().any(|bp| bp.in_index == i))
            .ok_or_else(|| Error::InvalidFormat("no unbound coder input".into()))?;
        folder.packed_streams.push(index);
    } else {
        for _ in 0..num_packed {
            folder.packed_streams.push(read_number(r)?);
        }
    }
    Ok(folder)
}

fn parse_substreams_info(r: &mut Cursor<&[u8]>, model: &mut ArchiveModel) -> Result<()> {
    model.streams_per_folder = vec![1; model.folders.len()];
    let mut id = read_u8(r)?;
    if id == property_id::NUM_UNPACK_STREAM {
        for count in &mut model.streams_per_folder {
            *count = read_count(r, MAX_ENTRIES)? as u64;
        }
        id = read_u8(r)?;
    }

    let read_sizes = id == property_id::SIZE;
    model.stream_sizes.clear();
    for (folder, &count) in model.folders.iter().zip(&model.streams_per_folder) {
        if count == 0 {
            continue;
        }
        let total = folder.final_unpack_size().unwrap_or(0);
        let mut used = 0u64;
        if read_sizes {
            for _ in 1..count {
                let size = read_number(r)?;
                used = used
                    .checked_add(size)
                    .filter(|&u| u <= total)
                    .ok_or_else(|| Error::InvalidFormat("substream sizes exceed folder".into()))?;
                model.stream_sizes.push(size);
            }
        }
        model.stream_sizes.push(total - used);
    }
    if read_sizes {
        id = read_u8(r)?;
    }

    model.stream_crcs.clear();
    for (folder, &count) in model.folders.iter().zip(&model.streams_per_folder) {
        if count == 1 && folder.crc.is_some() {
            model.stream_crcs.push(folder.crc);
        } else {
            model.stream_crcs.extend(std::iter::repeat_n(None, count as usize));
        }
    }

    loop {
        match id {
            property_id::END => return Ok(()),
            property_id::CRC => {
                let slots: Vec<usize> = digest_slots(model);
                let defined = read_all_or_bits(r, slots.len())?;
                for (slot, defined) in slots.into_iter().zip(defined) {
                    if defined {
                        model.stream_crcs[slot] = Some(read_u32_le(r)?);
                    }
                }
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unexpected property {other:#04x} in substreams info"
                )));
            }
        }
        id = read_u8(r)?;
    }
}

/// Stream indices whose digests are listed in the substreams block.
fn digest_slots(model: &ArchiveModel) -> Vec<usize> {
    let mut slots = Vec::new();
    let mut stream = 0;
    for (folder, &count) in model.folders.iter().zip(&model.streams_per_folder) {
        let count = count as usize;
        if count != 1 || folder.crc.is_none() {
            slots.extend(stream..stream + count);
        }
        stream += count;
    }
    slots
}

fn parse_files_info(r: &mut Cursor<&[u8]>) -> Result<Vec<FileRecord>> {
    let count = read_count(r, MAX_ENTRIES)?;
    let mut files = vec![
        FileRecord {
            has_stream: true,
            ..Default::default()
        };
        count
    ];
    let mut empty_indices: Vec<usize> = Vec::new();

    loop {
        let id = read_u8(r)?;
        if id == property_id::END {
            break;
        }
        let size = read_number(r)?;
        let remaining = r.get_ref().len() as u64 - r.position();
        if size > remaining {
            return Err(Error::InvalidFormat("file property past end of header".into()));
        }
        let data = read_bytes(r, size as usize)?;
        let mut p = Cursor::new(data.as_slice());
        match id {
            property_id::EMPTY_STREAM => {
                let bits = read_bool_vector(&mut p, count)?;
                empty_indices.clear();
                for (index, (file, empty)) in files.iter_mut().zip(bits).enumerate() {
                    file.has_stream = !empty;
                    file.is_dir = empty;
                    if empty {
                        empty_indices.push(index);
                    }
                }
            }
            property_id::EMPTY_FILE => {
                let bits = read_bool_vector(&mut p, empty_indices.len())?;
                for (&index, is_file) in empty_indices.iter().zip(bits) {
                    files[index].is_dir = !is_file;
                }
            }
            property_id::ANTI => {
                let bits = read_bool_vector(&mut p, empty_indices.len())?;
                for (&index, anti) in empty_indices.iter().zip(bits) {
                    files[index].is_anti = anti;
                }
            }
            property_id::NAME => {
                if read_u8(&mut p)? != 0 {
                    return Err(Error::UnsupportedFeature {
                        feature: "external 7z names",
                    });
                }
                let names = parse_names(&data[1..], count)?;
                for (file, name) in files.iter_mut().zip(names) {
                    file.name = name;
                }
            }
            property_id::CTIME | property_id::ATIME | property_id::MTIME => {
                let values = parse_defined_values(&mut p, count, read_u64_le)?;
                for (file, value) in files.iter_mut().zip(values) {
                    match id {
                        property_id::CTIME => file.ctime = value,
                        property_id::ATIME => file.atime = value,
                        _ => file.mtime = value,
                    }
                }
            }
            property_id::WIN_ATTRIBUTES => {
                let values = parse_defined_values(&mut p, count, read_u32_le)?;
                for (file, value) in files.iter_mut().zip(values) {
                    file.attributes = value;
                }
            }
            property_id::DUMMY => {}
            other => log::warn!("skipping unknown 7z file property {other:#04x}"),
        }
    }
    Ok(files)
}

fn parse_defined_values<R: Read, T>(
    p: &mut R,
    count: usize,
    read: impl Fn(&mut R) -> std::io::Result<T>,
) -> Result<Vec<Option<T>>> {
    let defined = read_all_or_bits(p, count)?;
    if read_u8(p)? != 0 {
        return Err(Error::UnsupportedFeature {
            feature: "external 7z file properties",
        });
    }
    defined
        .into_iter()
        .map(|d| if d { read(p).map(Some) } else { Ok(None) })
        .collect::<std::io::Result<_>>()
        .map_err(Error::from)
}

fn parse_names(data: &[u8], count: usize) -> Result<Vec<String>> {
    if data.len() % 2 != 0 {
        return Err(Error::InvalidFormat("odd-length 7z name block".into()));
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let names: Vec<String> = units
        .split(|&u| u == 0)
        .take(count)
        .map(String::from_utf16_lossy)
        .collect();
    if names.len() != count || units.last() != Some(&0) {
        return Err(Error::InvalidFormat("7z name count mismatch".into()));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::method;

    fn archive_bytes(model: &ArchiveModel, packed: &[u8]) -> Vec<u8> {
        let header = model.encode();
        let start = StartHeader {
            next_header_offset: packed.len() as u64,
            next_header_size: header.len() as u64,
            next_header_crc: crc32fast::hash(&header),
        };
        let mut out = start.encode().to_vec();
        out.extend_from_slice(packed);
        out.extend_from_slice(&header);
        out
    }

    #[test]
    fn test_start_header_roundtrip() {
        let start = StartHeader {
            next_header_offset: 10,
            next_header_size: 20,
            next_header_crc: 0xDEADBEEF,
        };
        let block = start.encode();
        assert_eq!(&block[..6], SIGNATURE);
        assert_eq!(StartHeader::parse(&block).unwrap(), start);
    }

    #[test]
    fn test_start_header_crc_checked() {
        let mut block = StartHeader {
            next_header_offset: 1,
            next_header_size: 2,
            next_header_crc: 3,
        }
        .encode();
        block[20] ^= 0xFF;
        assert!(matches!(
            StartHeader::parse(&block),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_model_survives_reparse() {
        let mut model = ArchiveModel::default();
        model.push_stream(Coder::simple(method::COPY, None), 5, 5, crc32fast::hash(b"hello"));
        model.files.push(FileRecord {
            name: "../../evil".into(),
            has_stream: true,
            attributes: Some(0x8020 | (0o100644 << 16)),
            mtime: Some(133_000_000_000_000_000),
            ..Default::default()
        });
        model.files.push(FileRecord {
            name: "empty".into(),
            attributes: Some(0x8020),
            ..Default::default()
        });
        let bytes = archive_bytes(&model, b"hello");
        let parsed = read_archive(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(parsed, model);
        assert_eq!(
            decode_folder(&mut Cursor::new(bytes), &parsed, 0).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_solid_folder_reparse() {
        let mut model = ArchiveModel {
            pack_sizes: vec![6],
            folders: vec![Folder {
                coders: vec![Coder::simple(method::COPY, None)],
                bind_pairs: Vec::new(),
                packed_streams: vec![0],
                unpack_sizes: vec![6],
                crc: None,
            }],
            streams_per_folder: vec![2],
            stream_sizes: vec![2, 4],
            stream_crcs: vec![Some(crc32fast::hash(b"ab")), Some(crc32fast::hash(b"cdef"))],
            ..Default::default()
        };
        for name in ["a", "b"] {
            model.files.push(FileRecord {
                name: name.into(),
                has_stream: true,
                ..Default::default()
            });
        }
        let bytes = archive_bytes(&model, b"abcdef");
        assert_eq!(read_archive(&mut Cursor::new(bytes)).unwrap(), model);
    }

    #[test]
    fn test_decode_folder_offset_overflow() {
        let mut model = ArchiveModel::default();
        model.push_stream(Coder::simple(method::COPY, None), u64::MAX, 1, 0);
        model.push_stream(Coder::simple(method::COPY, None), 1, 1, 0);
        let result = decode_folder(&mut Cursor::new(Vec::new()), &model, 1);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_coder_stream_count_limited() {
        // One coder, complex flag, method 0x21, u64::MAX in and out streams.
        let mut data = vec![1, 0x11, 0x21, 0xFF];
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.push(1);
        let result = parse_folder(&mut Cursor::new(data.as_slice()));
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_archive() {
        let start = StartHeader {
            next_header_offset: 0,
            next_header_size: 0,
            next_header_crc: 0,
        };
        let model = read_archive(&mut Cursor::new(start.encode().to_vec())).unwrap();
        assert!(model.files.is_empty());
    }

    #[test]
    fn test_unknown_file_property_skipped() {
        let model = ArchiveModel {
            files: vec![FileRecord {
                name: "x".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut header = model.encode();
        // Insert an unknown property (id 0x30, 2 bytes) before the final two ENDs.
        let at = header.len() - 2;
        header.splice(at..at, [0x30, 2, 0xAA, 0xBB]);
        let start = StartHeader {
            next_header_offset: 0,
            next_header_size: header.len() as u64,
            next_header_crc: crc32fast::hash(&header),
        };
        let mut bytes = start.encode().to_vec();
        bytes.extend_from_slice(&header);
        let parsed = read_archive(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.files[0].name, "x");
    }

    #[test]
    fn test_aes_rejected() {
        let mut model = ArchiveModel::default();
        model.push_stream(Coder::simple(method::AES, Some(vec![0; 2])), 1, 1, 0);
        model.files.push(FileRecord {
            name: "secret".into(),
            has_stream: true,
            ..Default::default()
        });
        let bytes = archive_bytes(&model, b"x");
        assert!(matches!(
            read_archive(&mut Cursor::new(bytes)),
            Err(Error::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_names_require_terminator() {
        assert!(parse_names(&[b'a', 0], 1).is_err());
        assert_eq!(parse_names(&[b'a', 0, 0, 0], 1).unwrap(), vec!["a"]);
    }
}
