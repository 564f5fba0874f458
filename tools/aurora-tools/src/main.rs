use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use aurora_tools::cli::{BuildArgs, InspectArgs, MkinitCli, MkinitCommand};
use aurora_tools::error::ToolError;
use aurora_tools::image::{build_image, ImageSummary};
use aurora_tools::inspect::{inspect_file, Inspection};
use aurora_tools::output::{self, OutputFormat};
use aurora_tools::payload::Payload;
use aurora_tools::{layout, logging, persist};

const PROG: &str = "mkinit";

/// JSON result of a build.
#[derive(Serialize)]
struct BuildOutput {
    path: std::path::PathBuf,
    bytes: usize,
    image: ImageSummary,
}

fn build(args: &BuildArgs, format: OutputFormat) -> Result<(), ToolError> {
    let layout = layout::load(args.layout.as_deref())?;
    let payload = Payload::load(args.payload.as_deref())?;
    layout.validate(payload.len() as u64)?;

    let image = build_image(&layout, payload.bytes());
    let written = persist::write_image(&args.out, image.bytes())?;

    let human = format!("Wrote {} ({} bytes)", written.path.display(), written.bytes);
    let result = BuildOutput {
        path: written.path,
        bytes: written.bytes,
        image: image.summary(),
    };
    emit(format, &result, &human);
    Ok(())
}

fn inspect(args: &InspectArgs, format: OutputFormat) -> Result<(), ToolError> {
    let report: Inspection = inspect_file(&args.path)?;
    let mut human = format!(
        "{}: entry={:#x} segment={:#x}+{:#x} align={:#x} flags={:#x} ({} bytes)",
        args.path.display(),
        report.header.entry,
        report.program_header.offset,
        report.program_header.filesz,
        report.program_header.align,
        report.program_header.flags,
        report.file_size,
    );
    for problem in &report.problems {
        human.push_str(&format!("\n  problem: {problem}"));
    }
    emit(format, &report, &human);
    if report.is_consistent() {
        Ok(())
    } else {
        Err(ToolError::MalformedImage {
            reason: format!("{} header check(s) failed", report.problems.len()),
        })
    }
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, human: &str) {
    if let Err(e) = output::emit(format, value, human) {
        log::warn!("failed to write result: {e}");
    }
}

fn main() -> ExitCode {
    let cli = MkinitCli::parse();
    logging::init(PROG, cli.verbose);
    let format = cli.output;

    let result = match cli.into_command() {
        MkinitCommand::Build(args) => build(&args, format),
        MkinitCommand::Inspect(args) => inspect(&args, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::emit_error(format, PROG, e.exit_status(), &e.to_string());
            e.exit_code()
        }
    }
}
