//! Image builder: layout + code → a complete single-segment ELF64 image.

use serde::Serialize;

use crate::elf::{FileHeader, ProgramHeader, EHDR_SIZE};
use crate::layout::{Fill, Layout, Span};

/// A finished image together with the headers written into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub header: FileHeader,
    pub program_header: ProgramHeader,
    pub spans: Vec<Span>,
    bytes: Vec<u8>,
}

/// Geometry reported after a build.
#[derive(Clone, Debug, Serialize)]
pub struct ImageSummary {
    pub entry: u64,
    pub segment_offset: u64,
    pub segment_size: u64,
    pub image_size: u64,
    pub regions: Vec<Span>,
}

impl Image {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The segment as it appears in the file.
    pub fn segment(&self) -> &[u8] {
        let start = self.program_header.offset as usize;
        &self.bytes[start..start + self.program_header.filesz as usize]
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            entry: self.header.entry,
            segment_offset: self.program_header.offset,
            segment_size: self.program_header.filesz,
            image_size: self.bytes.len() as u64,
            regions: self.spans.clone(),
        }
    }
}

/// Build the image for `code` placed at the start of the segment described
/// by `layout`.
///
/// `layout` must pass [`Layout::validate`] for `code.len()`; the built-in
/// layout always does. The output depends only on the inputs.
pub fn build_image(layout: &Layout, code: &[u8]) -> Image {
    debug_assert!(layout.validate(code.len() as u64).is_ok());

    let code_len = code.len() as u64;
    let segment_size = layout.segment_size(code_len);
    let image_size = layout.image_size(code_len) as usize;

    // Zero-filled: reserved regions and the gaps between regions rely on it.
    let mut buf = vec![0u8; image_size];

    let header = FileHeader::executable(layout.machine, layout.entry());
    header.write_to(&mut buf[..EHDR_SIZE]);

    let program_header = ProgramHeader::load(
        layout.flags,
        layout.segment_offset,
        layout.load_address,
        segment_size,
        layout.segment_align,
    );
    let phoff = header.phoff as usize;
    program_header.write_to(&mut buf[phoff..]);

    let segment = &mut buf[layout.segment_offset as usize..];
    segment[..code.len()].copy_from_slice(code);
    for region in &layout.regions {
        if let Fill::Bytes(bytes) = &region.fill {
            let start = region.offset as usize;
            segment[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }

    log::debug!(
        "built image: entry={:#x} segment={:#x}+{:#x} size={}",
        header.entry,
        layout.segment_offset,
        segment_size,
        image_size
    );

    Image {
        header,
        program_header,
        spans: layout.spans(code_len),
        bytes: buf,
    }
}
