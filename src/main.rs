use backsim::cli::{Cli, run};
use backsim::logging::init_tracing;
use clap::Parser;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}
