//! Recursive-descent parser over the wand store grammar.
//!
//! The grammar is nested and version-dependent: `fileVersion` gates both
//! the header shape (the profile count moved in version 5) and per-record
//! optional fields (version 4 added two site-metadata strings, version 6
//! a `LastModified` sub-record). Records are read strictly bottom-up, and
//! every reader takes the file version as an explicit parameter.
//!
//! The whole tree is materialized eagerly; nothing borrows the input
//! stream after parsing returns.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::WandError;
use crate::strings::read_encrypted_string;

/// Oldest supported store version.
pub const MIN_FILE_VERSION: u32 = 2;
/// Newest supported store version.
pub const MAX_FILE_VERSION: u32 = 6;

/// Version that added the two per-credential site-metadata strings.
const VERSION_SITE_METADATA: u32 = 4;
/// Version that moved the profile count behind an extended header block.
const VERSION_EXTENDED_HEADER: u32 = 5;
/// Version that added per-record `LastModified` sub-records.
const VERSION_LAST_MODIFIED: u32 = 6;

const INPUT_FLAG_PASSWORD: u8 = 1 << 0;
const INPUT_FLAG_USERNAME: u8 = 1 << 3;

/// Role flags of a form input.
///
/// Only bit 0 (password field) and bit 3 (username field) have known
/// meaning; the remaining bits are preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormInputFlags(pub u8);

impl FormInputFlags {
    pub fn is_password(self) -> bool {
        self.0 & INPUT_FLAG_PASSWORD != 0
    }

    pub fn is_username(self) -> bool {
        self.0 & INPUT_FLAG_USERNAME != 0
    }
}

/// A fully parsed wand store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WandFile {
    pub file_version: u32,
    pub app_version: u32,
    /// Header field of unestablished meaning; preserved as-is.
    pub unknown: u32,
    pub profiles: Vec<Profile>,
    /// Structurally identical to the numbered profiles; distinguished
    /// only by its position after them.
    pub log_profile: Profile,
    pub credentials: Vec<LegacyCredential>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    /// Always 0 or 1 in well-formed stores.
    pub flags: u8,
    pub credentials: Vec<FormCredential>,
}

/// A stored form credential: one remembered form fill for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCredential {
    pub last_modified: Option<LastModified>,
    pub form_url: Option<String>,
    pub submit_name: Option<String>,
    /// Raw site metadata, present from store version 4.
    pub unknown3: Option<String>,
    /// Raw site metadata, present from store version 4.
    pub site_url: Option<String>,
    pub unknown5: u32,
    pub unknown6: u32,
    pub unknown7: u32,
    pub unknown8: u32,
    pub unknown9: u32,
    pub unknown10: u32,
    pub inputs: Vec<FormInput>,
}

/// One saved form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub flags: FormInputFlags,
    pub name: Option<String>,
    pub value: Option<String>,
    /// For password-flagged inputs this holds the actual password text
    /// (observed empirically; `value` is empty in such records).
    pub extra: Option<String>,
}

/// Modification stamp attached to records from store version 6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastModified {
    pub unknown0: u32,
    pub unknown1: Option<String>,
    pub timestamp: Option<String>,
}

/// A pre-form-store credential: a plain URL/username/password triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCredential {
    pub last_modified: Option<LastModified>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl WandFile {
    /// Parse a complete wand store from `input`.
    pub fn read<R: Read + Seek>(input: &mut R) -> Result<WandFile, WandError> {
        let file_version = input.read_u32::<BigEndian>()?;
        let app_version = input.read_u32::<BigEndian>()?;
        if !(MIN_FILE_VERSION..=MAX_FILE_VERSION).contains(&file_version) {
            return Err(WandError::UnsupportedVersion {
                version: file_version,
            });
        }

        // Version 5 reshuffled the header: the profile count moved behind
        // a block of skipped/unknown fields, and the count and the unknown
        // u32 swapped order.
        let (profile_count, unknown) = if file_version >= VERSION_EXTENDED_HEADER {
            input.seek(SeekFrom::Current(4))?;
            let unknown = input.read_u32::<BigEndian>()?;
            input.seek(SeekFrom::Current(16))?;
            (input.read_u32::<BigEndian>()?, unknown)
        } else {
            let profile_count = input.read_u32::<BigEndian>()?;
            (profile_count, input.read_u32::<BigEndian>()?)
        };

        let mut profiles = Vec::new();
        for _ in 0..profile_count {
            profiles.push(Profile::read(input, file_version)?);
        }
        let log_profile = Profile::read(input, file_version)?;

        let credential_count = input.read_u32::<BigEndian>()?;
        let mut credentials = Vec::new();
        for _ in 0..credential_count {
            credentials.push(LegacyCredential::read(input, file_version)?);
        }

        Ok(WandFile {
            file_version,
            app_version,
            unknown,
            profiles,
            log_profile,
            credentials,
        })
    }
}

impl Profile {
    fn read<R: Read + Seek>(input: &mut R, version: u32) -> Result<Profile, WandError> {
        let name = read_encrypted_string(input)?;

        let offset = input.stream_position()?;
        let flags = input.read_u8()?;
        if flags > 1 {
            return Err(WandError::InvalidProfileFlags {
                value: flags,
                offset,
            });
        }

        let credential_count = input.read_u32::<BigEndian>()?;
        let mut credentials = Vec::new();
        for _ in 0..credential_count {
            credentials.push(FormCredential::read(input, version)?);
        }

        Ok(Profile {
            name,
            flags,
            credentials,
        })
    }
}

impl FormCredential {
    fn read<R: Read + Seek>(input: &mut R, version: u32) -> Result<FormCredential, WandError> {
        let last_modified = LastModified::read(input, version)?;
        let form_url = read_encrypted_string(input)?;
        let submit_name = read_encrypted_string(input)?;

        let (unknown3, site_url) = if version >= VERSION_SITE_METADATA {
            (
                read_encrypted_string(input)?,
                read_encrypted_string(input)?,
            )
        } else {
            (None, None)
        };

        // Stream position is authoritative here, not the logical field
        // index: the format interleaves these opaque values in the order
        // 5, 7, 8, 9, 10, 6.
        let unknown5 = input.read_u32::<BigEndian>()?;
        let unknown7 = input.read_u32::<BigEndian>()?;
        let unknown8 = input.read_u32::<BigEndian>()?;
        let unknown9 = input.read_u32::<BigEndian>()?;
        let unknown10 = input.read_u32::<BigEndian>()?;
        let unknown6 = input.read_u32::<BigEndian>()?;

        let input_count = input.read_u32::<BigEndian>()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(FormInput::read(input)?);
        }

        Ok(FormCredential {
            last_modified,
            form_url,
            submit_name,
            unknown3,
            site_url,
            unknown5,
            unknown6,
            unknown7,
            unknown8,
            unknown9,
            unknown10,
            inputs,
        })
    }
}

impl FormInput {
    fn read<R: Read>(input: &mut R) -> Result<FormInput, WandError> {
        Ok(FormInput {
            flags: FormInputFlags(input.read_u8()?),
            name: read_encrypted_string(input)?,
            value: read_encrypted_string(input)?,
            extra: read_encrypted_string(input)?,
        })
    }
}

impl LastModified {
    fn read<R: Read>(input: &mut R, version: u32) -> Result<Option<LastModified>, WandError> {
        if version < VERSION_LAST_MODIFIED {
            return Ok(None);
        }
        Ok(Some(LastModified {
            unknown0: input.read_u32::<BigEndian>()?,
            unknown1: read_encrypted_string(input)?,
            timestamp: read_encrypted_string(input)?,
        }))
    }
}

impl LegacyCredential {
    fn read<R: Read>(input: &mut R, version: u32) -> Result<LegacyCredential, WandError> {
        Ok(LegacyCredential {
            last_modified: LastModified::read(input, version)?,
            url: read_encrypted_string(input)?,
            username: read_encrypted_string(input)?,
            password: read_encrypted_string(input)?,
        })
    }
}
