use serde_json::{Map, Value};
use simbatch_core::{BatchError, ErrorInfo};
use simbatch_exp::{ExperimentArtifacts, ExperimentSpec, InputSchema};

use crate::plan::CampaignPlan;

/// Experiment described entirely by a plan file.
///
/// The main configuration starts from the plan's base config; every input
/// with a `config_key` overrides that key with its current value. Topology
/// and flows are copied verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanExperiment {
    inputs: InputSchema,
    base_config: Map<String, Value>,
    topology: Value,
    flows: Vec<Value>,
    overrides: Vec<(String, String)>,
    link_companions: bool,
}

impl PlanExperiment {
    /// Declares the plan's inputs and loads its JSON companions.
    pub fn from_plan(plan: &CampaignPlan) -> Result<Self, BatchError> {
        let mut inputs = InputSchema::new();
        let mut overrides = Vec::new();
        for input in &plan.inputs {
            inputs.declare_input(&input.name, &input.description, input.default.clone())?;
            if let Some(key) = &input.config_key {
                overrides.push((input.name.clone(), key.clone()));
            }
        }

        let base_config = match &plan.base_config {
            Some(path) => match plan.read_json(path)? {
                Value::Object(map) => map,
                _ => {
                    return Err(BatchError::Plan(
                        ErrorInfo::new("plan.base_config", "base config must be a JSON object")
                            .with_context("path", path.display().to_string()),
                    ))
                }
            },
            None => Map::new(),
        };
        let topology = match &plan.topology {
            Some(path) => plan.read_json(path)?,
            None => Value::Object(Map::new()),
        };
        let flows = match &plan.flows {
            Some(path) => flow_list(plan.read_json(path)?).ok_or_else(|| {
                BatchError::Plan(
                    ErrorInfo::new("plan.flows", "flows must be a list or {\"flows\": [...]}")
                        .with_context("path", path.display().to_string()),
                )
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            inputs,
            base_config,
            topology,
            flows,
            overrides,
            link_companions: plan.link_companions,
        })
    }

    /// Factory producing a fresh copy per run.
    pub fn factory(&self) -> impl FnMut() -> PlanExperiment + '_ {
        move || self.clone()
    }
}

fn flow_list(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(flows) => Some(flows),
        Value::Object(mut map) => match map.remove("flows") {
            Some(Value::Array(flows)) => Some(flows),
            _ => None,
        },
        _ => None,
    }
}

impl ExperimentSpec for PlanExperiment {
    fn inputs(&self) -> &InputSchema {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut InputSchema {
        &mut self.inputs
    }

    fn configure(&mut self) -> Result<ExperimentArtifacts, BatchError> {
        let mut artifacts = ExperimentArtifacts::new();
        artifacts.config = self.base_config.clone();
        for (input, key) in &self.overrides {
            let value = self.inputs.get(input)?.clone();
            artifacts.set_config(key.clone(), value);
        }
        artifacts.topology = self.topology.clone();
        artifacts.flows = self.flows.clone();
        if self.link_companions {
            artifacts.link_companions();
        }
        Ok(artifacts)
    }
}
