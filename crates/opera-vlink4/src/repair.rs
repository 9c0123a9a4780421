//! Single-pass scan-and-repair over the visited-links TLV stream.
//!
//! Corruption in this format manifests as lost high-order bits of a
//! 16-bit record length (a length that outgrew the field was truncated
//! on write). The low 16 bits are still correct, so the repair tries the
//! declared length with restored high bits until a candidate ends on a
//! plausible next-record boundary. The next record's tag byte is the only
//! validity oracle the format offers; there is no checksum.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::VlinkError;

/// Top-level record tag, the only value the outer stream may carry.
pub const TOP_RECORD_TAG: u8 = 2;

// Inner field tags.
const TAG_URL: u8 = 3;
const TAG_TIME_VISITED: u8 = 4;
const TAG_ANCHOR: u8 = 34;
const TAG_WAS_FORM_REQUEST: u8 = 139;

/// Number of high-bit extensions the repair search tries (restoring bits
/// 16..21 of the true length). This is an empirical, format-specific
/// bound: observed corruption never loses more than five bits. Exhausting
/// it is a hard failure, not a cue to widen the window.
const LENGTH_SEARCH_WINDOW: u32 = 32;

const HEADER_LEN: u64 = 12;

/// Fixed header of a visited-links file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlinkHeader {
    pub file_version: u32,
    pub app_version: u32,
    pub id_tag_width: u16,
    pub length_width: u16,
}

impl VlinkHeader {
    /// Read and validate the header.
    ///
    /// The width fields are format assertions, not configuration: the
    /// format only ever shipped 1-byte tags and 2-byte lengths, and the
    /// whole repair hinges on that layout.
    pub fn read<R: Read>(input: &mut R) -> Result<VlinkHeader, VlinkError> {
        let file_version = input.read_u32::<BigEndian>()?;
        let app_version = input.read_u32::<BigEndian>()?;
        let id_tag_width = input.read_u16::<BigEndian>()?;
        let length_width = input.read_u16::<BigEndian>()?;
        if id_tag_width != 1 || length_width != 2 {
            return Err(VlinkError::BadFieldWidths {
                id_tag_width,
                length_width,
            });
        }
        Ok(VlinkHeader {
            file_version,
            app_version,
            id_tag_width,
            length_width,
        })
    }

    pub fn write<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_u32::<BigEndian>(self.file_version)?;
        output.write_u32::<BigEndian>(self.app_version)?;
        output.write_u16::<BigEndian>(self.id_tag_width)?;
        output.write_u16::<BigEndian>(self.length_width)?;
        Ok(())
    }
}

/// Progress notification emitted while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairEvent {
    /// A top-level record begins at `offset`.
    Record { offset: u64 },
    /// The record at `offset` failed the boundary check; the search
    /// recovered `length` (the declared low bits plus restored high bits).
    Repair {
        offset: u64,
        declared: u16,
        length: u32,
    },
}

/// Outcome of a completed repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub records: u64,
    pub repaired: u64,
}

/// Copy `input` to `output`, validating every record length and
/// repairing the ones that fail the boundary check.
///
/// Well-formed records are copied verbatim. A repaired record is
/// re-parsed as an inner TLV sequence, its anchor fields dropped, and
/// re-serialized under the recomputed length. `observe` receives one
/// [`RepairEvent::Record`] per record, before it is processed, and a
/// [`RepairEvent::Repair`] when the search path is taken.
pub fn repair_stream<R, W, F>(
    input: &mut R,
    output: &mut W,
    mut observe: F,
) -> Result<RepairSummary, VlinkError>
where
    R: Read + Seek,
    W: Write,
    F: FnMut(RepairEvent),
{
    let header = VlinkHeader::read(input)?;
    header.write(output)?;

    let end = input.seek(SeekFrom::End(0))?;
    input.seek(SeekFrom::Start(HEADER_LEN))?;

    let mut summary = RepairSummary::default();
    let mut offset = HEADER_LEN;
    while offset < end {
        observe(RepairEvent::Record { offset });
        summary.records += 1;

        let tag = input.read_u8()?;
        if tag != TOP_RECORD_TAG {
            return Err(VlinkError::UnexpectedTopTag { tag, offset });
        }
        let declared = input.read_u16::<BigEndian>()?;
        let data_start = offset + 3;
        let next = data_start + u64::from(declared);

        // Fast path: the declared length reaches exactly to end-of-stream.
        if next == end {
            copy_record(input, output, declared)?;
            offset = next;
            continue;
        }

        // The declared length is trusted iff it lands on a record tag.
        if peek_byte_at(input, next)? == Some(TOP_RECORD_TAG) {
            copy_record(input, output, declared)?;
            offset = next;
            continue;
        }

        let length = search_true_length(input, data_start, declared)?
            .ok_or(VlinkError::UnrepairableRecord { offset })?;
        observe(RepairEvent::Repair {
            offset,
            declared,
            length,
        });

        let mut payload = vec![0u8; length as usize];
        input.read_exact(&mut payload)?;
        let rebuilt = rebuild_payload(&payload, data_start)?;
        if rebuilt.len() > usize::from(u16::MAX) {
            return Err(VlinkError::RepairedRecordTooLarge {
                offset,
                len: rebuilt.len(),
            });
        }

        output.write_u8(TOP_RECORD_TAG)?;
        output.write_u16::<BigEndian>(rebuilt.len() as u16)?;
        output.write_all(&rebuilt)?;
        summary.repaired += 1;
        offset = data_start + u64::from(length);
    }

    Ok(summary)
}

/// Brute-force the lost high bits: try `declared | (i << 16)` for every
/// `i` in the search window and accept the first candidate whose
/// following byte is a record tag. First match wins, which breaks ties
/// toward the shortest record.
fn search_true_length<R: Read + Seek>(
    input: &mut R,
    data_start: u64,
    declared: u16,
) -> Result<Option<u32>, VlinkError> {
    for high in 0..LENGTH_SEARCH_WINDOW {
        let candidate = u32::from(declared) | (high << 16);
        if peek_byte_at(input, data_start + u64::from(candidate))? == Some(TOP_RECORD_TAG) {
            return Ok(Some(candidate));
        }
        log::debug!("no record boundary at +{candidate:#x} (high bits {high})");
    }
    Ok(None)
}

/// Peek one byte at an absolute offset, restoring the stream position.
///
/// Returns `None` past end-of-stream; a candidate that points there is
/// simply not a boundary. Repeated peeks during the search must not
/// perturb the eventual payload read, hence the explicit mark/restore.
fn peek_byte_at<R: Read + Seek>(input: &mut R, offset: u64) -> io::Result<Option<u8>> {
    let saved = input.stream_position()?;
    input.seek(SeekFrom::Start(offset))?;
    let mut byte = [0u8; 1];
    let peeked = match input.read(&mut byte) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(e) => Err(e),
    };
    input.seek(SeekFrom::Start(saved))?;
    peeked
}

fn copy_record<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    length: u16,
) -> Result<(), VlinkError> {
    output.write_u8(TOP_RECORD_TAG)?;
    output.write_u16::<BigEndian>(length)?;
    let copied = io::copy(&mut input.by_ref().take(u64::from(length)), output)?;
    if copied != u64::from(length) {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "record payload truncated").into());
    }
    Ok(())
}

/// Re-parse a repaired record's payload and re-serialize the fields that
/// survive: url (3), time-visited (4) and was-form-request (139) are kept
/// verbatim, anchor fields (34) are dropped. Any other tag is
/// unrecoverable corruption; there is no second heuristic inside a
/// record.
fn rebuild_payload(payload: &[u8], payload_offset: u64) -> Result<Vec<u8>, VlinkError> {
    let mut rebuilt = Vec::with_capacity(payload.len());
    let mut pos = 0usize;
    while pos < payload.len() {
        let offset = payload_offset + pos as u64;
        let Some(header) = payload.get(pos..pos + 3) else {
            return Err(VlinkError::TruncatedInnerField { offset });
        };
        let tag = header[0];
        let length = usize::from(u16::from_be_bytes([header[1], header[2]]));
        let end = pos + 3 + length;
        if payload.get(pos + 3..end).is_none() {
            return Err(VlinkError::TruncatedInnerField { offset });
        }

        match tag {
            TAG_URL | TAG_TIME_VISITED | TAG_WAS_FORM_REQUEST => {
                rebuilt.extend_from_slice(&payload[pos..end]);
            }
            TAG_ANCHOR => {}
            _ => return Err(VlinkError::UnknownInnerField { tag, offset }),
        }
        pos = end;
    }
    Ok(rebuilt)
}
