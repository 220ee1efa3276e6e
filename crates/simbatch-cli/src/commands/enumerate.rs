use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use simbatch_campaign::load_plan;
use simbatch_exp::ParameterSpace;

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    /// YAML campaign plan.
    #[arg(long)]
    pub plan: PathBuf,
}

pub fn run(args: &EnumerateArgs) -> Result<(), Box<dyn Error>> {
    let plan = load_plan(&args.plan)?;
    let space = plan.parameter_space()?;
    let stdout = io::stdout();
    write_points(&space, &mut stdout.lock())
}

/// Writes `{"index": i, "point": {...}}` per line, in enumeration order.
pub fn write_points(space: &ParameterSpace, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    for (index, point) in space.enumerate().enumerate() {
        let line = serde_json::to_string(&json!({ "index": index, "point": point }))?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
