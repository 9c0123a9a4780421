//! Length-prefixed encrypted field decoding.
//!
//! Every variable-length field in the store is a signed 32-bit big-endian
//! byte count followed by a salted blob (see [`crate::crypto`]). A zero
//! count means the field is absent; that is not an error and is distinct
//! from a present-but-empty value.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use zeroize::Zeroizing;

use crate::crypto::decrypt_blob;
use crate::error::WandError;

/// Read a length-prefixed encrypted blob and return its plaintext, or
/// `None` for a zero-length (absent) field.
pub fn read_encrypted_bytes<R: Read>(
    input: &mut R,
) -> Result<Option<Zeroizing<Vec<u8>>>, WandError> {
    let length = input.read_i32::<BigEndian>()?;
    if length == 0 {
        return Ok(None);
    }
    if length < 0 {
        return Err(WandError::MalformedLength { length });
    }

    let mut blob = vec![0u8; length as usize];
    input.read_exact(&mut blob)?;
    decrypt_blob(&blob).map(Some)
}

/// Read an encrypted text field.
///
/// The plaintext spans the full decrypted byte length and is UTF-16LE;
/// a NUL code point terminates the value early (stores in the wild pad
/// some fields with trailing NULs).
pub fn read_encrypted_string<R: Read>(input: &mut R) -> Result<Option<String>, WandError> {
    let Some(plaintext) = read_encrypted_bytes(input)? else {
        return Ok(None);
    };
    Ok(Some(decode_utf16le(&plaintext)))
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let (text, _had_errors) = UTF_16LE.decode_without_bom_handling(bytes);
    match text.find('\0') {
        Some(end) => text[..end].to_string(),
        None => text.into_owned(),
    }
}
