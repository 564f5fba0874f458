//! Segment layout of the `/init` image.
//!
//! The built-in layout is a compile-time table of [`RegionSpec`]s whose
//! disjointness and extent are asserted at build time. A [`Layout`] is the
//! runtime form of the same table, optionally overridden from a TOML file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::elf::{EHDR_SIZE, EM_RISCV, PF_RWX, PHDR_SIZE};
use crate::error::ToolError;
use crate::payload;

/// Virtual address the segment is mapped at; also the entry point.
pub const LOAD_ADDRESS: u64 = 0x4000_0000;
/// File offset of the segment, one page in.
pub const SEGMENT_OFFSET: u64 = 0x1000;
pub const SEGMENT_ALIGN: u64 = 0x1000;
pub const PAGE_SIZE: u64 = 0x1000;

/// End of the header area the segment must not start inside.
pub const HEADERS_END: u64 = (EHDR_SIZE + PHDR_SIZE) as u64;

/// Largest image a configured layout may describe.
pub const MAX_IMAGE_SIZE: u64 = 16 << 20;

// ── Compile-time table ───────────────────────────────────────────────

/// A named byte range, relative to the segment start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionSpec {
    pub name: &'static str,
    pub offset: u64,
    pub len: u64,
}

impl RegionSpec {
    pub const fn new(name: &'static str, offset: u64, len: u64) -> Self {
        Self { name, offset, len }
    }

    pub const fn end(&self) -> u64 {
        self.offset + self.len
    }
}

pub const CODE: RegionSpec = RegionSpec::new("code", 0x000, payload::INIT_CODE.len() as u64);
pub const INIT_MSG: RegionSpec = RegionSpec::new("init_msg", 0x200, payload::INIT_MSG.len() as u64);
pub const ISSUE_PATH: RegionSpec =
    RegionSpec::new("issue_path", 0x220, payload::ISSUE_PATH.len() as u64);
pub const ISSUE_OPEN_FAIL: RegionSpec =
    RegionSpec::new("issue_open_fail", 0x240, payload::ISSUE_OPEN_FAIL.len() as u64);
pub const ISSUE_READ_FAIL: RegionSpec =
    RegionSpec::new("issue_read_fail", 0x260, payload::ISSUE_READ_FAIL.len() as u64);
pub const ISSUE_BUF: RegionSpec = RegionSpec::new("issue_buf", 0x280, payload::ISSUE_BUF_LEN);

pub const INIT_REGIONS: [RegionSpec; 6] =
    [CODE, INIT_MSG, ISSUE_PATH, ISSUE_OPEN_FAIL, ISSUE_READ_FAIL, ISSUE_BUF];

/// True when no two non-empty regions share a byte.
pub const fn regions_disjoint(regions: &[RegionSpec]) -> bool {
    let mut i = 0;
    while i < regions.len() {
        let mut j = i + 1;
        while j < regions.len() {
            let (a, b) = (regions[i], regions[j]);
            if a.len != 0 && b.len != 0 && a.offset < b.end() && b.offset < a.end() {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

/// Largest `offset + len` over `regions`: the smallest segment holding all of them.
pub const fn segment_extent(regions: &[RegionSpec]) -> u64 {
    let mut max = 0;
    let mut i = 0;
    while i < regions.len() {
        if regions[i].end() > max {
            max = regions[i].end();
        }
        i += 1;
    }
    max
}

pub const INIT_SEGMENT_SIZE: u64 = segment_extent(&INIT_REGIONS);

const _: () = assert!(regions_disjoint(&INIT_REGIONS));
const _: () = assert!(INIT_SEGMENT_SIZE == ISSUE_BUF.end());
const _: () = assert!(SEGMENT_OFFSET >= HEADERS_END);
const _: () = assert!(SEGMENT_ALIGN.is_power_of_two() && SEGMENT_ALIGN >= PAGE_SIZE);

// ── Runtime layout ───────────────────────────────────────────────────

/// What the builder puts in a region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fill {
    /// Copied verbatim.
    Bytes(Vec<u8>),
    /// Left zero for the program to use at run time.
    Zeroed(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub offset: u64,
    pub fill: Fill,
}

impl Region {
    pub fn bytes(name: &str, offset: u64, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            offset,
            fill: Fill::Bytes(bytes.to_vec()),
        }
    }

    pub fn zeroed(name: &str, offset: u64, len: u64) -> Self {
        Self {
            name: name.to_string(),
            offset,
            fill: Fill::Zeroed(len),
        }
    }

    pub fn len(&self) -> u64 {
        match &self.fill {
            Fill::Bytes(bytes) => bytes.len() as u64,
            Fill::Zeroed(len) => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len())
    }
}

/// Placement of one region, as reported by `mkinit` and `inspect`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub name: String,
    pub offset: u64,
    pub len: u64,
}

/// Everything the builder needs besides the code bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub machine: u16,
    pub load_address: u64,
    pub segment_offset: u64,
    pub segment_align: u64,
    pub flags: u32,
    /// Data regions. The code always sits at segment offset 0 and is not listed.
    pub regions: Vec<Region>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::init()
    }
}

impl Layout {
    /// The layout the built-in `/init` code was assembled against.
    pub fn init() -> Self {
        Self {
            machine: EM_RISCV,
            load_address: LOAD_ADDRESS,
            segment_offset: SEGMENT_OFFSET,
            segment_align: SEGMENT_ALIGN,
            flags: PF_RWX,
            regions: vec![
                Region::bytes(INIT_MSG.name, INIT_MSG.offset, payload::INIT_MSG),
                Region::bytes(ISSUE_PATH.name, ISSUE_PATH.offset, payload::ISSUE_PATH),
                Region::bytes(ISSUE_OPEN_FAIL.name, ISSUE_OPEN_FAIL.offset, payload::ISSUE_OPEN_FAIL),
                Region::bytes(ISSUE_READ_FAIL.name, ISSUE_READ_FAIL.offset, payload::ISSUE_READ_FAIL),
                Region::zeroed(ISSUE_BUF.name, ISSUE_BUF.offset, ISSUE_BUF.len),
            ],
        }
    }

    /// Entry point: code starts at the segment base.
    pub fn entry(&self) -> u64 {
        self.load_address
    }

    /// The code followed by every data region, in table order.
    pub fn spans(&self, code_len: u64) -> Vec<Span> {
        let mut spans = Vec::with_capacity(self.regions.len() + 1);
        spans.push(Span {
            name: CODE.name.to_string(),
            offset: 0,
            len: code_len,
        });
        spans.extend(self.regions.iter().map(|r| Span {
            name: r.name.clone(),
            offset: r.offset,
            len: r.len(),
        }));
        spans
    }

    /// Largest `offset + len` over the code and all regions.
    pub fn segment_size(&self, code_len: u64) -> u64 {
        self.regions
            .iter()
            .map(|r| r.offset.saturating_add(r.len()))
            .fold(code_len, u64::max)
    }

    pub fn image_size(&self, code_len: u64) -> u64 {
        self.segment_offset.saturating_add(self.segment_size(code_len))
    }

    /// Check the geometry a loader and the code rely on.
    ///
    /// The built-in layout always passes; this guards layouts read from a
    /// config file.
    pub fn validate(&self, code_len: u64) -> Result<(), ToolError> {
        if !self.segment_align.is_power_of_two() || self.segment_align < PAGE_SIZE {
            return Err(invalid(format!(
                "segment_align {:#x} must be a power of two >= {PAGE_SIZE:#x}",
                self.segment_align
            )));
        }
        if self.segment_offset < HEADERS_END {
            return Err(invalid(format!(
                "segment_offset {:#x} overlaps the headers (end {HEADERS_END:#x})",
                self.segment_offset
            )));
        }
        if self.segment_offset % self.segment_align != self.load_address % self.segment_align {
            return Err(invalid(format!(
                "segment_offset {:#x} and load_address {:#x} disagree modulo {:#x}",
                self.segment_offset, self.load_address, self.segment_align
            )));
        }
        if code_len == 0 {
            return Err(invalid("code is empty".to_string()));
        }
        for region in &self.regions {
            if region.end().is_none() {
                return Err(invalid(format!("region `{}` overflows", region.name)));
            }
        }
        let image_end = self
            .segment_offset
            .checked_add(self.segment_size(code_len))
            .and_then(|end| end.checked_add(self.load_address));
        if image_end.is_none() {
            return Err(invalid("segment does not fit the address space".to_string()));
        }
        let image_size = self.image_size(code_len);
        if image_size > MAX_IMAGE_SIZE {
            return Err(invalid(format!(
                "image would be {image_size:#x} bytes, limit is {MAX_IMAGE_SIZE:#x}"
            )));
        }

        let spans = self.spans(code_len);
        for (i, a) in spans.iter().enumerate() {
            for b in &spans[i + 1..] {
                if a.name == b.name {
                    return Err(invalid(format!("region `{}` is listed twice", a.name)));
                }
                let overlaps = a.len != 0
                    && b.len != 0
                    && a.offset < b.offset + b.len
                    && b.offset < a.offset + a.len;
                if overlaps {
                    return Err(ToolError::RegionOverlap {
                        first: a.name.clone(),
                        second: b.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> ToolError {
    ToolError::InvalidLayout { reason }
}

// ── TOML overrides ───────────────────────────────────────────────────

/// Layout overrides read from a TOML file. Absent keys keep the built-in values.
///
/// ```toml
/// load_address = 0x4000_0000
/// segment_offset = 0x1000
///
/// [[regions]]
/// name = "init_msg"
/// text = "init: hello\n"
///
/// [[regions]]
/// name = "banner_buf"
/// offset = 0x300
/// reserve = 128
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    #[serde(default)]
    pub machine: Option<u16>,
    #[serde(default)]
    pub load_address: Option<u64>,
    #[serde(default)]
    pub segment_offset: Option<u64>,
    #[serde(default)]
    pub segment_align: Option<u64>,
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

/// Override for a built-in region (matched by name) or a new region.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub offset: Option<u64>,
    /// Literal content. Use `\u0000` for a NUL terminator.
    #[serde(default)]
    pub text: Option<String>,
    /// Zero-filled reservation of this many bytes.
    #[serde(default)]
    pub reserve: Option<u64>,
}

impl RegionConfig {
    fn fill(&self) -> Result<Option<Fill>, ToolError> {
        match (&self.text, self.reserve) {
            (Some(_), Some(_)) => Err(invalid(format!(
                "region `{}` sets both `text` and `reserve`",
                self.name
            ))),
            (Some(text), None) => Ok(Some(Fill::Bytes(text.as_bytes().to_vec()))),
            (None, Some(len)) => Ok(Some(Fill::Zeroed(len))),
            (None, None) => Ok(None),
        }
    }
}

impl Layout {
    /// Apply `config` on top of the built-in layout.
    pub fn from_config(config: &LayoutConfig) -> Result<Self, ToolError> {
        let mut layout = Self::init();
        if let Some(machine) = config.machine {
            layout.machine = machine;
        }
        if let Some(addr) = config.load_address {
            layout.load_address = addr;
        }
        if let Some(offset) = config.segment_offset {
            layout.segment_offset = offset;
        }
        if let Some(align) = config.segment_align {
            layout.segment_align = align;
        }

        for rc in &config.regions {
            if rc.name == CODE.name {
                return Err(invalid(format!(
                    "`{}` is fixed at offset 0; use --payload to replace it",
                    CODE.name
                )));
            }
            let fill = rc.fill()?;
            match layout.regions.iter_mut().find(|r| r.name == rc.name) {
                Some(region) => {
                    if let Some(offset) = rc.offset {
                        region.offset = offset;
                    }
                    if let Some(fill) = fill {
                        region.fill = fill;
                    }
                }
                None => {
                    let (Some(offset), Some(fill)) = (rc.offset, fill) else {
                        return Err(invalid(format!(
                            "new region `{}` needs `offset` and one of `text`/`reserve`",
                            rc.name
                        )));
                    };
                    layout.regions.push(Region {
                        name: rc.name.clone(),
                        offset,
                        fill,
                    });
                }
            }
        }
        Ok(layout)
    }
}

/// Parse TOML layout overrides from a string.
pub fn parse_config_str(s: &str) -> Result<LayoutConfig, ToolError> {
    toml::from_str(s).map_err(|e| ToolError::LayoutParse(e.to_string()))
}

/// The built-in layout, or the built-in layout overridden by the TOML file at `path`.
pub fn load(path: Option<&Path>) -> Result<Layout, ToolError> {
    let Some(path) = path else {
        return Ok(Layout::init());
    };
    let contents = fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&contents)?;
    log::debug!(
        "layout overrides from {}: {} region(s)",
        path.display(),
        config.regions.len()
    );
    Layout::from_config(&config)
}
