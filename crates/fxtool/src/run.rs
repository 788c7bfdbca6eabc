use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::environment::Environment;
use crate::paths::AppPaths;
use crate::{check, glsl, layout, plan};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    if let Command::Where = cli.command {
        return print_paths();
    }

    let env = Environment::resolve(&cli.env)?;
    match cli.command {
        Command::Check(args) => check::run(&env, args),
        Command::Glsl(args) => glsl::run(&env, args),
        Command::Layout(args) => layout::run(&env, args),
        Command::Plan(args) => plan::run(&env, args),
        Command::Where => print_paths(),
    }
}

// Reports go to stdout, so logs stay on stderr.
fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_paths() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("config:   {}", paths.config_dir().display());
    println!("data:     {}", paths.data_dir().display());
    println!("settings: {}", paths.settings_file().display());
    println!("shaders:  {}", paths.shader_dir().display());
    Ok(())
}
