use clap::Parser;

use netwalker::cli::Cli;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity)
        .format_timestamp_secs()
        .init();

    std::process::exit(netwalker::run(cli));
}
