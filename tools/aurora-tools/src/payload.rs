//! The `/init` program: its pre-assembled code and the data it expects to
//! find at fixed offsets inside its segment.
//!
//! The code loads every data address as `0x4000_0000 + <offset>` (`lui` +
//! `addi`), so the offsets in [`crate::layout`] must not move unless the code
//! is reassembled to match.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ToolError;

/// RV64GC machine code for `/init`.
///
/// Writes the init message to stdout, opens and reads `/etc/issue` into the
/// scratch buffer, echoes it, reports open/read failures on stderr, then
/// exits and spins.
#[rustfmt::skip]
pub const INIT_CODE: [u8; 160] = [
    0x05, 0x45, 0xb7, 0x05, 0x00, 0x40, 0x93, 0x85, 0x05, 0x20, 0x25, 0x46,
    0x93, 0x08, 0x00, 0x04, 0x73, 0x00, 0x00, 0x00, 0x13, 0x05, 0xc0, 0xf9,
    0xb7, 0x05, 0x00, 0x40, 0x93, 0x85, 0x05, 0x22, 0x01, 0x46, 0x81, 0x46,
    0x93, 0x08, 0x80, 0x03, 0x73, 0x00, 0x00, 0x00, 0x63, 0x4a, 0x05, 0x04,
    0x2a, 0x84, 0xb7, 0x05, 0x00, 0x40, 0x93, 0x85, 0x05, 0x28, 0x13, 0x06,
    0x00, 0x04, 0x93, 0x08, 0xf0, 0x03, 0x73, 0x00, 0x00, 0x00, 0x63, 0x5d,
    0xa0, 0x00, 0x2a, 0x86, 0x05, 0x45, 0xb7, 0x05, 0x00, 0x40, 0x93, 0x85,
    0x05, 0x28, 0x93, 0x08, 0x00, 0x04, 0x73, 0x00, 0x00, 0x00, 0x19, 0xa8,
    0x05, 0x45, 0xb7, 0x05, 0x00, 0x40, 0x93, 0x85, 0x05, 0x26, 0x45, 0x46,
    0x93, 0x08, 0x00, 0x04, 0x73, 0x00, 0x00, 0x00, 0x22, 0x85, 0x93, 0x08,
    0x90, 0x03, 0x73, 0x00, 0x00, 0x00, 0x19, 0xa8, 0x05, 0x45, 0xb7, 0x05,
    0x00, 0x40, 0x93, 0x85, 0x05, 0x24, 0x45, 0x46, 0x93, 0x08, 0x00, 0x04,
    0x73, 0x00, 0x00, 0x00, 0x01, 0x45, 0x93, 0x08, 0xd0, 0x05, 0x73, 0x00,
    0x00, 0x00, 0xdd, 0xbf,
];

pub const INIT_MSG: &[u8] = b"init: ok\n";
pub const ISSUE_PATH: &[u8] = b"/etc/issue\0";
pub const ISSUE_OPEN_FAIL: &[u8] = b"issue: open fail\n";
pub const ISSUE_READ_FAIL: &[u8] = b"issue: read fail\n";
/// Bytes reserved for the `read(2)` of `/etc/issue`.
pub const ISSUE_BUF_LEN: u64 = 64;

/// Where the code bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadSource {
    BuiltIn,
    File(PathBuf),
}

/// Opaque machine code placed at the start of the segment.
#[derive(Clone, Debug)]
pub struct Payload {
    pub source: PayloadSource,
    bytes: Cow<'static, [u8]>,
}

impl Payload {
    pub fn built_in() -> Self {
        Self {
            source: PayloadSource::BuiltIn,
            bytes: Cow::Borrowed(&INIT_CODE),
        }
    }

    /// Read a raw pre-assembled binary. Empty files are rejected.
    pub fn from_file(path: &Path) -> Result<Self, ToolError> {
        let bytes = fs::read(path).map_err(|source| ToolError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(ToolError::EmptyPayload {
                path: path.to_path_buf(),
            });
        }
        log::debug!("loaded {} payload bytes from {}", bytes.len(), path.display());
        Ok(Self {
            source: PayloadSource::File(path.to_path_buf()),
            bytes: Cow::Owned(bytes),
        })
    }

    /// Built-in code unless `path` names a companion artifact.
    pub fn load(path: Option<&Path>) -> Result<Self, ToolError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::built_in()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
