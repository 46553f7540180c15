use std::process;

use anyhow::Result;
use clap::Parser;
use sandboxer::cli::{Action, Cli};
use sandboxer::paths::PATHS;
use sandboxer::utils::logging;
use sandboxer::{lifecycle, preflight};
use tracing::error;

fn main() {
    let cli = Cli::parse();
    logging::init(&PATHS.log_file);

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    cli.validate()?;
    preflight::check()?;

    let code = match cli.action() {
        Action::Create => lifecycle::create(&PATHS, cli.name.as_deref(), cli.config())?,
        Action::Enter => lifecycle::enter(&PATHS, cli.name.as_deref())?,
        Action::Delete => lifecycle::delete(&PATHS)?,
    };
    Ok(code)
}
