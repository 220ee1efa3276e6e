use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use simbatch_campaign::{load_plan, Campaign, LogProgress, PlanExperiment};
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML campaign plan.
    #[arg(long)]
    pub plan: PathBuf,
    /// Maximum number of concurrent jobs; overrides the plan.
    #[arg(long)]
    pub parallelism: Option<usize>,
    /// Skip the launcher's prepare step.
    #[arg(long)]
    pub no_prepare: bool,
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let plan = load_plan(&args.plan)?;
    let space = plan.parameter_space()?;
    let template = PlanExperiment::from_plan(&plan)?;

    let mut config = plan.campaign_config()?;
    if let Some(parallelism) = args.parallelism {
        config = config.with_parallelism(parallelism);
    }
    if args.no_prepare {
        config = config.without_prepare();
    }

    let campaign = Campaign::new(config, plan.runtime()?).with_observer(Arc::new(LogProgress));
    let result = campaign.run(template.factory(), &space)?;
    info!(
        root = %result.root().display(),
        succeeded = result.report().succeeded,
        failed = result.report().failed,
        "campaign complete"
    );
    println!("{}", result.root().display());
    if let Some(report) = result.failures() {
        eprintln!("{report}");
    }
    result.check()?;
    Ok(())
}
