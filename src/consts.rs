//! Runtime constants
//!
//! # consts
//!
//! This module houses constants used throughout the code. Some of these are
//! lazily-evaluated environment variables that provide command-line defaults.

use std::env;

use once_cell::sync::Lazy;

pub const VERSION: &str = env!("KPTAG_VERSION");

/// Marker that starts the XML document in `keepassxc-cli export` output.
pub const XML_MARKER: &[u8] = b"<?xml";
/// Declaration prepended to the filtered document.
pub const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" ?>";

/// Entry fields that are part of every entry and thus never count as tags.
pub const RESERVED_FIELDS: &[&str] = &[
    "Notes",
    "Password",
    "Title",
    "URL",
    "UserName",
    "TOTP Seed",
    "TOTP Settings",
];

pub static KPTAG_KEEPASSXC_CLI: Lazy<String> = Lazy::new(|| match env::var("KPTAG_KEEPASSXC_CLI") {
    Ok(bin) if !bin.is_empty() => bin,
    _ => String::from("keepassxc-cli"),
});
// memory-backed by default so the plaintext never touches a disk
pub static KPTAG_TMPDIR: Lazy<String> = Lazy::new(|| match env::var("KPTAG_TMPDIR") {
    Ok(dir) if !dir.is_empty() => dir,
    _ => String::from("/dev/shm"),
});

pub const ALNUM: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
