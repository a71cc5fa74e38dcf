use clap::Parser;
use lattice_cli::cli::Cli;
use lattice_cli::error::EXIT_SUCCESS;

fn init_logging(verbose: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "lattice_cli=debug,lattice_store=debug,lattice_index=debug,lattice_ingest=debug"
    } else {
        "lattice_cli=info,lattice_store=warn,lattice_ingest=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match lattice_cli::run(cli) {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}
