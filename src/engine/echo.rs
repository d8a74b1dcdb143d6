//! Echo engine.
//!
//! Registers the standard command table and pipes every command's input
//! straight to its output. Used by the standalone binary and by tests that
//! exercise the gateway without a real engine.

use async_trait::async_trait;

use super::{CommandDescriptor, DataType, Engine, EngineError, Invocation};

const FORMATS: &[&str] = &["json", "yson", "dsv", "yamr", "yamred_dsv", "schemaful_dsv"];

/// Engine that echoes input to output.
#[derive(Debug, Clone)]
pub struct EchoEngine {
    descriptors: Vec<CommandDescriptor>,
}

impl EchoEngine {
    pub fn new() -> Self {
        use DataType::{Binary, Structured, Tabular};
        let nothing = DataType::None;

        let descriptors = vec![
            // Reads.
            CommandDescriptor::new("get", nothing, Structured),
            CommandDescriptor::new("list", nothing, Structured),
            CommandDescriptor::new("exists", nothing, Structured),
            CommandDescriptor::new("read", nothing, Tabular).heavy(),
            CommandDescriptor::new("download", nothing, Binary).heavy(),
            // Writes.
            CommandDescriptor::new("set", Structured, nothing).volatile(),
            CommandDescriptor::new("write", Tabular, nothing).volatile().heavy(),
            CommandDescriptor::new("upload", Binary, nothing).volatile().heavy(),
            // Mutations and operations.
            CommandDescriptor::new("create", nothing, Structured).volatile(),
            CommandDescriptor::new("remove", nothing, nothing).volatile(),
            CommandDescriptor::new("copy", nothing, Structured).volatile(),
            CommandDescriptor::new("move", nothing, Structured).volatile(),
            CommandDescriptor::new("lock", nothing, Structured).volatile(),
            CommandDescriptor::new("start_tx", nothing, Structured).volatile(),
            CommandDescriptor::new("commit_tx", nothing, nothing).volatile(),
            CommandDescriptor::new("abort_tx", nothing, nothing).volatile(),
            CommandDescriptor::new("map", nothing, Structured).volatile(),
            CommandDescriptor::new("reduce", nothing, Structured).volatile(),
            CommandDescriptor::new("map_reduce", nothing, Structured).volatile(),
            CommandDescriptor::new("sort", nothing, Structured).volatile(),
            CommandDescriptor::new("merge", nothing, Structured).volatile(),
            CommandDescriptor::new("erase", nothing, Structured).volatile(),
        ];

        Self { descriptors }
    }

    /// Replace the command table.
    pub fn with_descriptors(descriptors: Vec<CommandDescriptor>) -> Self {
        Self { descriptors }
    }
}

impl Default for EchoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for EchoEngine {
    fn find_command_descriptor(&self, name: &str) -> Option<CommandDescriptor> {
        self.descriptors.iter().find(|d| d.name == name).cloned()
    }

    fn list_command_descriptors(&self) -> Vec<CommandDescriptor> {
        self.descriptors.clone()
    }

    fn is_format_registered(&self, name: &str) -> bool {
        FORMATS.contains(&name)
    }

    async fn execute(&self, invocation: Invocation) -> Result<(), EngineError> {
        let Invocation {
            command,
            mut input,
            output,
            parameters,
            ..
        } = invocation;

        tracing::debug!(command = %command, parameters = parameters.len(), "Echo engine executing");

        while let Some(chunk) = input.read().await {
            if !output.write(chunk) {
                break;
            }
        }
        output.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_commands_are_the_bulk_ones() {
        let engine = EchoEngine::new();
        for name in ["download", "upload", "read", "write"] {
            assert!(engine.find_command_descriptor(name).unwrap().is_heavy, "{name}");
        }
        for name in ["get", "set", "map"] {
            assert!(!engine.find_command_descriptor(name).unwrap().is_heavy, "{name}");
        }
    }

    #[test]
    fn knows_its_formats() {
        let engine = EchoEngine::new();
        assert!(engine.is_format_registered("dsv"));
        assert!(!engine.is_format_registered("uberzoldaten"));
    }
}
