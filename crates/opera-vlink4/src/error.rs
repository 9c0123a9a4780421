use thiserror::Error;

/// Errors produced while scanning or repairing a visited-links log.
///
/// All of these abort the run; a partially written output file is left
/// behind and must not be treated as valid.
#[derive(Debug, Error)]
pub enum VlinkError {
    /// The header's width constants differ from the only layout this
    /// format ever shipped (1-byte tags, 2-byte lengths).
    #[error("bad field widths: id tag = {id_tag_width} (expected 1), length = {length_width} (expected 2)")]
    BadFieldWidths { id_tag_width: u16, length_width: u16 },

    /// A top-level tag other than 2. Corruption is only ever observed in
    /// length fields, so a bad tag means the scan has lost the stream.
    #[error("unexpected top-level tag {tag:#04x} at offset {offset} (expected 2)")]
    UnexpectedTopTag { tag: u8, offset: u64 },

    /// The candidate-length search exhausted its window without finding
    /// a record boundary.
    #[error("record at offset {offset} has no recoverable length")]
    UnrepairableRecord { offset: u64 },

    /// An inner field tag outside the recognized set; there is no repair
    /// heuristic at this level.
    #[error("unknown inner field tag {tag} at offset {offset}")]
    UnknownInnerField { tag: u8, offset: u64 },

    /// An inner field's declared length runs past its record payload.
    #[error("inner field at offset {offset} overruns its record")]
    TruncatedInnerField { offset: u64 },

    /// The rebuilt payload no longer fits the 16-bit length field.
    #[error("repaired payload of record at offset {offset} is {len} bytes, which exceeds the 16-bit length field")]
    RepairedRecordTooLarge { offset: u64, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
