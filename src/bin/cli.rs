use clap::Parser;
use color_eyre::Report;
use feynforge::cli::Cli;

fn main() -> Result<(), Report> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    cli.run()
}
