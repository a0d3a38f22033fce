// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use squat_form::cli::analyze::run_analyze;
use squat_form::cli::args::{Cli, Commands};
use squat_form::cli::logging::set_verbose;
use squat_form::error;

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Analyze(args) => {
            set_verbose(args.verbose);
            run_analyze(args)
        }
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
