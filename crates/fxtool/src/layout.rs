use anyhow::Result;
use fx::state::{uniform_block_glsl, uniform_block_layout};
use serde::Serialize;

use crate::cli::LayoutArgs;
use crate::environment::Environment;

#[derive(Debug, Serialize)]
struct LayoutReport<'a> {
    size: usize,
    fields: &'a [fx::std140::Std140Field],
}

pub fn run(env: &Environment, args: LayoutArgs) -> Result<()> {
    let layout = uniform_block_layout();

    if args.glsl {
        let use_ubo = env.compile_options().use_ubo;
        println!("{}", uniform_block_glsl(use_ubo));
        return Ok(());
    }

    if args.json {
        let report = LayoutReport {
            size: layout.size(),
            fields: layout.fields(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for field in layout.fields() {
        println!("{:>4}  {:<22} {:?}", field.offset, field.name, field.ty);
    }
    println!("size: {} bytes", layout.size());
    Ok(())
}
