use clap::Parser;

mod cli;
pub mod exit_codes;
mod logging;

use cli::args::Cli;
use cli::commands::dispatch;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);
    let code = dispatch(cli);
    std::process::exit(code);
}
