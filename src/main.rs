use clap::Parser;
use site_tools::cli::Cli;
use site_tools::logging;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::init_logging(cli.verbose) {
        eprintln!("site-tools warning: {err:#}");
    }

    if let Err(err) = cli.run() {
        eprintln!("site-tools error: {err:#}");
        std::process::exit(1);
    }
}
