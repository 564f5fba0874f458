use serde::Serialize;
use std::fmt;

/// Output format selection for both tools.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object on stdout.
    Json,
    /// Human-readable summary on stdout.
    #[default]
    Human,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Write a successful result to stdout.
///
/// - **Json**: `value` as a single JSON object, no extraneous text.
/// - **Human**: the `human` line as given.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, human: &str) -> Result<(), std::io::Error> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(value).map_err(std::io::Error::other)?;
            println!("{json}");
        }
        OutputFormat::Human => println!("{human}"),
    }
    Ok(())
}

/// Render an error for `format`: a JSON object for stdout, or a prefixed line for stderr.
pub fn render_error(format: OutputFormat, prefix: &str, exit_code_num: u8, message: &str) -> String {
    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": message,
                "exit_code": exit_code_num,
            });
            obj.to_string()
        }
        OutputFormat::Human => format!("{prefix}: {message}"),
    }
}

/// Write an error to stdout (JSON mode) or stderr (human mode).
pub fn emit_error(format: OutputFormat, prefix: &str, exit_code_num: u8, message: &str) {
    let line = render_error(format, prefix, exit_code_num, message);
    match format {
        // JSON errors go to stdout so the caller always gets valid JSON on stdout.
        OutputFormat::Json => println!("{line}"),
        OutputFormat::Human => eprintln!("{line}"),
    }
}
