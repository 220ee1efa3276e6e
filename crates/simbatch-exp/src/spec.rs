use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use simbatch_core::{BatchError, ErrorInfo};
use simbatch_host::{RunSandbox, MAIN_CONFIG};

use crate::space::ParameterPoint;

/// Artifact holding the network topology.
pub const TOPOLOGY_FILE: &str = "topology.json";
/// Artifact holding the flow list, wrapped as `{"flows": [...]}`.
pub const FLOWS_FILE: &str = "flows.json";
/// Flat echo of every input value, for inspection only.
pub const PROVENANCE_FILE: &str = "model.json";

#[derive(Debug, Clone, PartialEq)]
struct InputDecl {
    description: String,
    default: Value,
}

/// Declared inputs of an experiment together with their current values.
///
/// Reads and writes are validated against the declarations; undeclared names
/// are rejected at the call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    decls: IndexMap<String, InputDecl>,
    values: IndexMap<String, Value>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_input(
        &mut self,
        name: &str,
        description: &str,
        default: impl Into<Value>,
    ) -> Result<(), BatchError> {
        if self.decls.contains_key(name) {
            return Err(BatchError::DuplicateInput(
                ErrorInfo::new("spec.duplicate_input", "input already declared")
                    .with_context("name", name),
            ));
        }
        self.decls.insert(
            name.to_string(),
            InputDecl {
                description: description.to_string(),
                default: default.into(),
            },
        );
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), BatchError> {
        self.ensure_declared(name)?;
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Current value of `name`, falling back to its declared default.
    pub fn get(&self, name: &str) -> Result<&Value, BatchError> {
        let decl = self.ensure_declared(name)?;
        Ok(self.values.get(name).unwrap_or(&decl.default))
    }

    /// Typed read of an input value.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, BatchError> {
        let value = self.get(name)?;
        serde_json::from_value(value.clone()).map_err(|err| {
            BatchError::Serde(
                ErrorInfo::new("spec.input_type", err.to_string()).with_context("name", name),
            )
        })
    }

    /// Sets every value of `point`.
    pub fn apply(&mut self, point: &ParameterPoint) -> Result<(), BatchError> {
        for (name, value) in point.iter() {
            self.set(name, value.clone())?;
        }
        Ok(())
    }

    /// Flat object of every declared input and its current value.
    pub fn values(&self) -> Map<String, Value> {
        self.decls
            .iter()
            .map(|(name, decl)| {
                let value = self.values.get(name).unwrap_or(&decl.default);
                (name.clone(), value.clone())
            })
            .collect()
    }

    fn describe_inputs(&self) -> String {
        self.decls
            .iter()
            .map(|(name, decl)| match decl.description.as_str() {
                "" => name.clone(),
                description => format!("{name} ({description})"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn ensure_declared(&self, name: &str) -> Result<&InputDecl, BatchError> {
        self.decls.get(name).ok_or_else(|| {
            BatchError::UnknownInput(
                ErrorInfo::new("spec.unknown_input", "input is not declared")
                    .with_context("name", name)
                    .with_hint(format!("declared inputs: {}", self.describe_inputs())),
            )
        })
    }
}

/// Outputs an experiment produces for one parameter point.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentArtifacts {
    pub config: Map<String, Value>,
    pub topology: Value,
    pub flows: Vec<Value>,
}

impl Default for ExperimentArtifacts {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentArtifacts {
    pub fn new() -> Self {
        Self {
            config: Map::new(),
            topology: Value::Object(Map::new()),
            flows: Vec::new(),
        }
    }

    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.config.insert(key.into(), value.into());
    }

    pub fn add_flow(&mut self, flow: Value) {
        self.flows.push(flow);
    }

    /// Points the main configuration at the companion files, keeping any
    /// reference the experiment already set.
    pub fn link_companions(&mut self) {
        self.config
            .entry("topology_file")
            .or_insert_with(|| Value::from(TOPOLOGY_FILE));
        self.config
            .entry("flow_file")
            .or_insert_with(|| Value::from(FLOWS_FILE));
    }

    /// Registers the main configuration, topology, flow list and the
    /// provenance echo on `sandbox`.
    pub fn register(
        self,
        sandbox: &mut RunSandbox,
        provenance: &Map<String, Value>,
    ) -> Result<(), BatchError> {
        sandbox.add_artifact(MAIN_CONFIG, &self.config)?;
        sandbox.add_artifact(TOPOLOGY_FILE, &self.topology)?;
        sandbox.add_artifact(FLOWS_FILE, &json!({ "flows": self.flows }))?;
        sandbox.add_artifact(PROVENANCE_FILE, provenance)?;
        Ok(())
    }
}

/// Capability contract implemented by every experiment type.
///
/// Implementors own an [`InputSchema`] and produce their artifacts in
/// [`ExperimentSpec::configure`]; declaration, validation and packaging into
/// sandbox artifacts are provided here.
pub trait ExperimentSpec {
    fn inputs(&self) -> &InputSchema;

    fn inputs_mut(&mut self) -> &mut InputSchema;

    /// Produces topology, configuration and flows from the current inputs.
    fn configure(&mut self) -> Result<ExperimentArtifacts, BatchError>;

    fn declare_input(
        &mut self,
        name: &str,
        description: &str,
        default: Value,
    ) -> Result<(), BatchError> {
        self.inputs_mut().declare_input(name, description, default)
    }

    fn set(&mut self, name: &str, value: Value) -> Result<(), BatchError> {
        self.inputs_mut().set(name, value)
    }

    fn get(&self, name: &str) -> Result<&Value, BatchError> {
        self.inputs().get(name)
    }

    fn build(&mut self, sandbox: &mut RunSandbox) -> Result<(), BatchError> {
        let artifacts = self.configure()?;
        let provenance = self.inputs().values();
        artifacts.register(sandbox, &provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_falls_back_to_default() {
        let mut schema = InputSchema::new();
        schema.declare_input("parity", "parity chunks", 0).unwrap();
        assert_eq!(schema.get("parity").unwrap(), &json!(0));
        schema.set("parity", 3).unwrap();
        assert_eq!(schema.get_as::<u32>("parity").unwrap(), 3);
    }

    #[test]
    fn undeclared_names_are_rejected() {
        let mut schema = InputSchema::new();
        schema.declare_input("mtu", "MTU", 4096).unwrap();
        assert!(matches!(
            schema.set("mut", 1),
            Err(BatchError::UnknownInput(_))
        ));
        let err = schema.get("bytes").unwrap_err();
        assert_eq!(err.info().code, "spec.unknown_input");
        assert_eq!(err.info().hint.as_deref(), Some("declared inputs: mtu (MTU)"));
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut schema = InputSchema::new();
        schema.declare_input("mtu", "MTU", Value::Null).unwrap();
        assert!(matches!(
            schema.declare_input("mtu", "again", 1),
            Err(BatchError::DuplicateInput(_))
        ));
    }

    #[test]
    fn values_echo_every_declared_input() {
        let mut schema = InputSchema::new();
        schema.declare_input("a", "", 1).unwrap();
        schema.declare_input("b", "", "x").unwrap();
        schema.set("b", "y").unwrap();
        assert_eq!(Value::Object(schema.values()), json!({"a": 1, "b": "y"}));
    }

    #[test]
    fn default_artifacts_start_with_empty_topology_object() {
        assert_eq!(ExperimentArtifacts::default(), ExperimentArtifacts::new());
        assert_eq!(ExperimentArtifacts::default().topology, json!({}));
    }

    #[test]
    fn link_companions_keeps_existing_references() {
        let mut artifacts = ExperimentArtifacts::new();
        artifacts.set_config("flow_file", "custom.json");
        artifacts.link_companions();
        assert_eq!(artifacts.config["topology_file"], json!(TOPOLOGY_FILE));
        assert_eq!(artifacts.config["flow_file"], json!("custom.json"));
    }
}
