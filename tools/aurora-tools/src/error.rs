use std::path::PathBuf;
use std::process::ExitCode;

/// All errors produced by `mkinit` and `net-perf`.
///
/// Variants are split into two categories:
/// - **Usage errors** (exit code 2): bad arguments, bad layout config, unusable payload
/// - **Operational errors** (exit code 1): I/O and network failures at run time
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    // ── Usage errors (exit code 2) ───────────────────────────────────

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("layout parse error: {0}")]
    LayoutParse(String),

    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("region `{first}` overlaps region `{second}`")]
    RegionOverlap { first: String, second: String },

    #[error("payload is empty: {path}")]
    EmptyPayload { path: PathBuf },

    // ── Operational errors (exit code 1) ─────────────────────────────

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not an ELF64 image: {reason}")]
    MalformedImage { reason: String },

    #[error("connect failed ({0})")]
    Connect(std::io::Error),

    #[error("header send failed ({0})")]
    HeaderSend(std::io::Error),

    #[error("send failed ({0})")]
    Send(std::io::Error),

    #[error("send returned 0")]
    SendReturnedZero,
}

impl ToolError {
    /// Map each error variant to its process exit code.
    ///
    /// - `2`: usage error (caught before any output file or socket is touched)
    /// - `1`: operational failure
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Raw numeric form of [`exit_code`](Self::exit_code).
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::InvalidArgument(_)
            | Self::LayoutParse(_)
            | Self::InvalidLayout { .. }
            | Self::RegionOverlap { .. }
            | Self::EmptyPayload { .. } => 2,

            Self::Read { .. }
            | Self::Write { .. }
            | Self::MalformedImage { .. }
            | Self::Connect(_)
            | Self::HeaderSend(_)
            | Self::Send(_)
            | Self::SendReturnedZero => 1,
        }
    }
}
