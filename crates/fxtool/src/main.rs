mod check;
mod cli;
mod environment;
mod glsl;
mod layout;
mod paths;
mod plan;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
