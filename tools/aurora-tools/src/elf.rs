//! ELF64 file header and program header encoding.
//!
//! Every header field is described by a [`Field`] descriptor (name, byte
//! offset, width). The descriptor tables are checked at compile time to tile
//! their header exactly, so a mistyped offset fails the build instead of
//! producing an image the loader rejects.

use serde::Serialize;

use crate::error::ToolError;

pub const ELFMAG: [u8; 4] = *b"\x7fELF";
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u8 = 1;
pub const ELFOSABI_SYSV: u8 = 0;

pub const ET_EXEC: u16 = 2;
pub const EM_RISCV: u16 = 243;

pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;
pub const PF_RWX: u32 = PF_R | PF_W | PF_X;

/// Size of the ELF64 file header.
pub const EHDR_SIZE: usize = 64;
/// Size of one ELF64 program header entry.
pub const PHDR_SIZE: usize = 56;

/// A fixed-width little-endian field inside a header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub size: usize,
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, size: usize) -> Self {
        Self { name, offset, size }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Store the low `size` bytes of `value` at this field's offset in `buf`.
    pub fn put(&self, buf: &mut [u8], value: u64) {
        debug_assert!(self.size <= 8, "{} is not a scalar field", self.name);
        debug_assert!(
            self.size == 8 || value >> (self.size * 8) == 0,
            "{} does not fit in {} bytes",
            self.name,
            self.size
        );
        let bytes = value.to_le_bytes();
        buf[self.offset..self.end()].copy_from_slice(&bytes[..self.size]);
    }

    /// Load this field from `buf` as a zero-extended little-endian integer.
    pub fn get(&self, buf: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[..self.size].copy_from_slice(&buf[self.offset..self.end()]);
        u64::from_le_bytes(bytes)
    }
}

/// True when `fields` are laid out back to back and cover exactly `size` bytes.
pub const fn fields_tile(fields: &[Field], size: usize) -> bool {
    let mut at = 0;
    let mut i = 0;
    while i < fields.len() {
        if fields[i].offset != at {
            return false;
        }
        at += fields[i].size;
        i += 1;
    }
    at == size
}

/// File header field descriptors.
pub mod ehdr {
    use super::Field;

    pub const IDENT: Field = Field::new("e_ident", 0, 16);
    pub const TYPE: Field = Field::new("e_type", 16, 2);
    pub const MACHINE: Field = Field::new("e_machine", 18, 2);
    pub const VERSION: Field = Field::new("e_version", 20, 4);
    pub const ENTRY: Field = Field::new("e_entry", 24, 8);
    pub const PHOFF: Field = Field::new("e_phoff", 32, 8);
    pub const SHOFF: Field = Field::new("e_shoff", 40, 8);
    pub const FLAGS: Field = Field::new("e_flags", 48, 4);
    pub const EHSIZE: Field = Field::new("e_ehsize", 52, 2);
    pub const PHENTSIZE: Field = Field::new("e_phentsize", 54, 2);
    pub const PHNUM: Field = Field::new("e_phnum", 56, 2);
    pub const SHENTSIZE: Field = Field::new("e_shentsize", 58, 2);
    pub const SHNUM: Field = Field::new("e_shnum", 60, 2);
    pub const SHSTRNDX: Field = Field::new("e_shstrndx", 62, 2);

    pub const ALL: [Field; 14] = [
        IDENT, TYPE, MACHINE, VERSION, ENTRY, PHOFF, SHOFF, FLAGS, EHSIZE, PHENTSIZE, PHNUM,
        SHENTSIZE, SHNUM, SHSTRNDX,
    ];
}

/// Program header field descriptors, relative to the entry start.
pub mod phdr {
    use super::Field;

    pub const TYPE: Field = Field::new("p_type", 0, 4);
    pub const FLAGS: Field = Field::new("p_flags", 4, 4);
    pub const OFFSET: Field = Field::new("p_offset", 8, 8);
    pub const VADDR: Field = Field::new("p_vaddr", 16, 8);
    pub const PADDR: Field = Field::new("p_paddr", 24, 8);
    pub const FILESZ: Field = Field::new("p_filesz", 32, 8);
    pub const MEMSZ: Field = Field::new("p_memsz", 40, 8);
    pub const ALIGN: Field = Field::new("p_align", 48, 8);

    pub const ALL: [Field; 8] = [TYPE, FLAGS, OFFSET, VADDR, PADDR, FILESZ, MEMSZ, ALIGN];
}

const _: () = assert!(fields_tile(&ehdr::ALL, EHDR_SIZE));
const _: () = assert!(fields_tile(&phdr::ALL, PHDR_SIZE));

// ── File header ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub ident: [u8; 16],
    pub e_type: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u64,
    pub phoff: u64,
    pub shoff: u64,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    /// Identification bytes for a 64-bit little-endian SysV image.
    #[rustfmt::skip]
    pub const IDENT: [u8; 16] = [
        ELFMAG[0], ELFMAG[1], ELFMAG[2], ELFMAG[3],
        ELFCLASS64, ELFDATA2LSB, EV_CURRENT, ELFOSABI_SYSV,
        0, 0, 0, 0, 0, 0, 0, 0,
    ];

    /// Header of a fixed-address executable with one program header placed
    /// directly after this header and no section headers.
    pub fn executable(machine: u16, entry: u64) -> Self {
        Self {
            ident: Self::IDENT,
            e_type: ET_EXEC,
            machine,
            version: 1,
            entry,
            phoff: EHDR_SIZE as u64,
            shoff: 0,
            flags: 0,
            ehsize: EHDR_SIZE as u16,
            phentsize: PHDR_SIZE as u16,
            phnum: 1,
            shentsize: 0,
            shnum: 0,
            shstrndx: 0,
        }
    }

    /// Encode into the first [`EHDR_SIZE`] bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[ehdr::IDENT.offset..ehdr::IDENT.end()].copy_from_slice(&self.ident);
        ehdr::TYPE.put(buf, self.e_type.into());
        ehdr::MACHINE.put(buf, self.machine.into());
        ehdr::VERSION.put(buf, self.version.into());
        ehdr::ENTRY.put(buf, self.entry);
        ehdr::PHOFF.put(buf, self.phoff);
        ehdr::SHOFF.put(buf, self.shoff);
        ehdr::FLAGS.put(buf, self.flags.into());
        ehdr::EHSIZE.put(buf, self.ehsize.into());
        ehdr::PHENTSIZE.put(buf, self.phentsize.into());
        ehdr::PHNUM.put(buf, self.phnum.into());
        ehdr::SHENTSIZE.put(buf, self.shentsize.into());
        ehdr::SHNUM.put(buf, self.shnum.into());
        ehdr::SHSTRNDX.put(buf, self.shstrndx.into());
    }

    /// Decode a 64-bit little-endian file header from the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self, ToolError> {
        if buf.len() < EHDR_SIZE {
            return Err(malformed(format!(
                "file is {} bytes, shorter than the {EHDR_SIZE}-byte header",
                buf.len()
            )));
        }
        let mut ident = [0u8; 16];
        ident.copy_from_slice(&buf[ehdr::IDENT.offset..ehdr::IDENT.end()]);
        if ident[..4] != ELFMAG {
            return Err(malformed("bad magic".to_string()));
        }
        if ident[4] != ELFCLASS64 {
            return Err(malformed(format!("class {} is not ELFCLASS64", ident[4])));
        }
        if ident[5] != ELFDATA2LSB {
            return Err(malformed(format!("data encoding {} is not little-endian", ident[5])));
        }

        // Narrowing casts below are lossless: `get` zero-extends exactly `size` bytes.
        Ok(Self {
            ident,
            e_type: ehdr::TYPE.get(buf) as u16,
            machine: ehdr::MACHINE.get(buf) as u16,
            version: ehdr::VERSION.get(buf) as u32,
            entry: ehdr::ENTRY.get(buf),
            phoff: ehdr::PHOFF.get(buf),
            shoff: ehdr::SHOFF.get(buf),
            flags: ehdr::FLAGS.get(buf) as u32,
            ehsize: ehdr::EHSIZE.get(buf) as u16,
            phentsize: ehdr::PHENTSIZE.get(buf) as u16,
            phnum: ehdr::PHNUM.get(buf) as u16,
            shentsize: ehdr::SHENTSIZE.get(buf) as u16,
            shnum: ehdr::SHNUM.get(buf) as u16,
            shstrndx: ehdr::SHSTRNDX.get(buf) as u16,
        })
    }
}

// ── Program header ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl ProgramHeader {
    /// A `PT_LOAD` entry mapping `size` file bytes at `offset` to `vaddr`,
    /// with no zero-fill tail.
    pub fn load(flags: u32, offset: u64, vaddr: u64, size: u64, align: u64) -> Self {
        Self {
            p_type: PT_LOAD,
            flags,
            offset,
            vaddr,
            paddr: vaddr,
            filesz: size,
            memsz: size,
            align,
        }
    }

    /// Encode into the first [`PHDR_SIZE`] bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        phdr::TYPE.put(buf, self.p_type.into());
        phdr::FLAGS.put(buf, self.flags.into());
        phdr::OFFSET.put(buf, self.offset);
        phdr::VADDR.put(buf, self.vaddr);
        phdr::PADDR.put(buf, self.paddr);
        phdr::FILESZ.put(buf, self.filesz);
        phdr::MEMSZ.put(buf, self.memsz);
        phdr::ALIGN.put(buf, self.align);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ToolError> {
        if buf.len() < PHDR_SIZE {
            return Err(malformed("program header table is truncated".to_string()));
        }
        Ok(Self {
            p_type: phdr::TYPE.get(buf) as u32,
            flags: phdr::FLAGS.get(buf) as u32,
            offset: phdr::OFFSET.get(buf),
            vaddr: phdr::VADDR.get(buf),
            paddr: phdr::PADDR.get(buf),
            filesz: phdr::FILESZ.get(buf),
            memsz: phdr::MEMSZ.get(buf),
            align: phdr::ALIGN.get(buf),
        })
    }
}

fn malformed(reason: String) -> ToolError {
    ToolError::MalformedImage { reason }
}
