use std::process::ExitCode;

use clap::Parser;

use aurora_tools::cli::NetPerfCli;
use aurora_tools::error::ToolError;
use aurora_tools::net_perf::{self, SendPlan, SendReport};
use aurora_tools::{logging, output};

const PROG: &str = "net-perf";

fn run(cli: &NetPerfCli) -> Result<SendReport, ToolError> {
    let plan = SendPlan::from_cli(cli)?;
    net_perf::run(&plan)
}

fn main() -> ExitCode {
    let cli = NetPerfCli::parse();
    logging::init(PROG, cli.verbose);

    match run(&cli) {
        Ok(report) => {
            if let Err(e) = output::emit(cli.output, &report, &report.to_string()) {
                log::warn!("failed to write result: {e}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            output::emit_error(cli.output, PROG, e.exit_status(), &e.to_string());
            e.exit_code()
        }
    }
}
