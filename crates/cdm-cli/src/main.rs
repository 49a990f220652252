use cdm_core::logging;

mod cli;

use crate::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // Initialize logging as early as possible.
    let log = logging::init_logging(cli.log_stderr);

    if let Err(err) = cli.run(log).await {
        eprintln!("cdm error: {:#}", err);
        std::process::exit(1);
    }
}
