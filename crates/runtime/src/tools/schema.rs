//! Tool descriptor to function schema translation.

use crate::model::FunctionSchema;
use crate::tools::ToolDescriptor;

/// Convert tool descriptors into provider function schemas.
///
/// One schema per descriptor, in input order. Duplicates pass through and
/// the parameter schema is copied verbatim.
pub fn translate(descriptors: &[ToolDescriptor]) -> Vec<FunctionSchema> {
    descriptors
        .iter()
        .map(|tool| FunctionSchema {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: tool.parameter_schema.clone(),
        })
        .collect()
}
