//! Immutable, process-wide catalogue of callable tools
//!
//! A [`ToolRegistry`] is built once at startup from independent tool groups
//! and shared read-only (`Arc<ToolRegistry>`) by every protocol server
//! instance. It never changes after construction; adding a tool means
//! building a new registry.

use crate::error::{ProtocolFault, ToolError};
use crate::mcp::schema::ObjectSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ToolResult = Result<Value, ToolError>;
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;
pub type ToolHandler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate tool id: {0}")]
    DuplicateTool(String),
}

/// One invocable capability
///
/// The handler receives the raw `arguments` object and is responsible for
/// validating it; the registry only looks tools up by id.
#[derive(Clone)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: ObjectSchema,
    pub output_schema: Option<ObjectSchema>,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ObjectSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
            handler: Arc::new(move |args: Value| -> ToolFuture { Box::pin(handler(args)) }),
        }
    }

    pub fn with_output_schema(mut self, schema: ObjectSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn invoke(&self, args: Value) -> ToolFuture {
        (self.handler)(args)
    }

    /// Wire form for `tools/list`; `name` carries the stable id
    pub fn to_wire(&self) -> rmcp::model::Tool {
        rmcp::model::Tool {
            name: self.id.clone().into(),
            title: Some(self.name.clone().into()),
            description: Some(self.description.clone().into()),
            input_schema: Arc::new(self.input_schema.export()),
            output_schema: self
                .output_schema
                .as_ref()
                .map(|schema| Arc::new(schema.export())),
            annotations: None,
            icons: None,
        }
    }
}

pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
    catalogue: Vec<rmcp::model::Tool>,
}

impl ToolRegistry {
    /// Builds a registry, keeping registration order
    ///
    /// # Errors
    ///
    /// * `RegistryError::DuplicateTool` - two tools share an id
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.id.clone(), position).is_some() {
                return Err(RegistryError::DuplicateTool(tool.id.clone()));
            }
        }

        let catalogue = tools.iter().map(ToolDefinition::to_wire).collect();

        Ok(Self {
            tools,
            index,
            catalogue,
        })
    }

    /// Concatenates independent tool groups in the order given
    pub fn from_groups<I>(groups: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Vec<ToolDefinition>>,
    {
        Self::new(groups.into_iter().flatten().collect())
    }

    /// Wire descriptions of every tool, in registration order
    pub fn list_tools(&self) -> &[rmcp::model::Tool] {
        &self.catalogue
    }

    pub fn get(&self, id: &str) -> Option<&ToolDefinition> {
        self.index.get(id).map(|&position| &self.tools[position])
    }

    /// Looks up `id` and starts its handler
    ///
    /// An unknown id is a protocol-level "method not found"; failures inside
    /// the handler are reported through the returned future.
    pub fn dispatch(&self, id: &str, args: Value) -> Result<ToolFuture, ProtocolFault> {
        self.get(id)
            .map(|tool| tool.invoke(args))
            .ok_or_else(|| ProtocolFault::MethodNotFound(format!("unknown tool '{}'", id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
