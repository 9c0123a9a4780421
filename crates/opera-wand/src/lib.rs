//! Decryption and parsing of legacy Opera `wand.dat` credential stores.
//!
//! A wand store is a nested, version-dependent binary tree of profiles,
//! stored form credentials and pre-form-store credentials, with every text
//! field stored as an independently salted triple-DES blob. This crate
//! parses store versions 2 through 6 and reports the recoverable
//! URL/username/password triples.
//!
//! The format carries no integrity checks: a wrong key derivation or a
//! misplaced read decrypts to garbage instead of failing, so the byte
//! layout and digest chain in [`crypto`] must be followed exactly.

pub mod crypto;
mod error;
pub mod report;
pub mod store;
pub mod strings;

pub use crate::error::WandError;
pub use crate::report::{recovered_logins, write_report, RecoveredLogin};
pub use crate::store::{
    FormCredential, FormInput, FormInputFlags, LastModified, LegacyCredential, Profile, WandFile,
};
