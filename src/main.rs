use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let args = match dcld::cli::Args::try_parse() {
        Ok(args) => args,
        Err(err) => err.exit(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dcld::run(args) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
