//! Reading an image back and checking its header invariants.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::elf::{FileHeader, ProgramHeader, EHDR_SIZE, PHDR_SIZE, PT_LOAD};
use crate::error::ToolError;

/// Decoded headers plus the result of each consistency check.
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub file_size: u64,
    pub header: FileHeader,
    pub program_header: ProgramHeader,
    /// Failed checks, empty when the image is consistent.
    pub problems: Vec<String>,
}

impl Inspection {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Decode a single-segment image and check that its headers agree.
pub fn inspect_bytes(buf: &[u8]) -> Result<Inspection, ToolError> {
    let header = FileHeader::parse(buf)?;
    if header.phnum == 0 {
        return Err(ToolError::MalformedImage {
            reason: "no program headers".to_string(),
        });
    }
    let phoff = usize::try_from(header.phoff)
        .ok()
        .filter(|&off| off <= buf.len())
        .ok_or_else(|| ToolError::MalformedImage {
            reason: format!("e_phoff {:#x} is past end of file", header.phoff),
        })?;
    let program_header = ProgramHeader::parse(&buf[phoff..])?;

    let mut problems = Vec::new();
    let mut check = |ok: bool, what: String| {
        if !ok {
            problems.push(what);
        }
    };
    check(
        header.ehsize as usize == EHDR_SIZE,
        format!("e_ehsize is {}, expected {EHDR_SIZE}", header.ehsize),
    );
    check(
        header.phentsize as usize == PHDR_SIZE,
        format!("e_phentsize is {}, expected {PHDR_SIZE}", header.phentsize),
    );
    check(
        program_header.p_type == PT_LOAD,
        format!("p_type is {}, expected PT_LOAD", program_header.p_type),
    );
    check(
        header.entry == program_header.vaddr,
        format!(
            "e_entry {:#x} differs from p_vaddr {:#x}",
            header.entry, program_header.vaddr
        ),
    );
    check(
        program_header.filesz == program_header.memsz,
        format!(
            "p_filesz {:#x} differs from p_memsz {:#x}",
            program_header.filesz, program_header.memsz
        ),
    );
    check(
        program_header.align.is_power_of_two()
            && program_header.offset % program_header.align
                == program_header.vaddr % program_header.align,
        format!(
            "p_offset {:#x} / p_vaddr {:#x} not congruent modulo p_align {:#x}",
            program_header.offset, program_header.vaddr, program_header.align
        ),
    );
    let segment_end = program_header.offset.checked_add(program_header.filesz);
    check(
        segment_end == Some(buf.len() as u64),
        format!(
            "file is {} bytes, segment ends at {:?}",
            buf.len(),
            segment_end
        ),
    );

    Ok(Inspection {
        file_size: buf.len() as u64,
        header,
        program_header,
        problems,
    })
}

pub fn inspect_file(path: &Path) -> Result<Inspection, ToolError> {
    let buf = fs::read(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    inspect_bytes(&buf)
}
