// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! MCP Protocol Schema Definitions
//!
//! Typed definitions for the initialize handshake, the tool list and tool
//! call results, so that no protocol JSON is written by hand.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server Information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// MCP Tool Schema Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonSchema,
}

/// JSON Schema Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// JSON Schema Property Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Element schema of array properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn typed(property_type: &str, description: &str) -> Self {
        Self {
            property_type: property_type.to_string(),
            description: Some(description.to_string()),
            items: None,
        }
    }

    fn number(description: &str) -> Self {
        Self::typed("number", description)
    }

    fn string(description: &str) -> Self {
        Self::typed("string", description)
    }

    fn number_array(description: &str) -> Self {
        Self {
            items: Some(Box::new(PropertySchema {
                property_type: "number".to_string(),
                description: None,
                items: None,
            })),
            ..Self::typed("array", description)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// MCP Server Capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

/// Complete MCP Initialize Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
}

impl InitializeResponse {
    pub fn new(protocol_version: String, server_name: String, server_version: String) -> Self {
        Self {
            protocol_version,
            server_info: ServerInfo {
                name: server_name,
                version: server_version,
            },
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
        }
    }
}

/// Response to `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResponse {
    pub tools: Vec<ToolSchema>,
}

/// One content block of a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error: false,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }
}

/// All tools exposed by the server
pub fn get_tools() -> Vec<ToolSchema> {
    vec![
        create_get_best_power_tool(),
        create_get_power_duration_curve_tool(),
        create_get_aerobic_decoupling_tool(),
        create_compare_intervals_tool(),
        create_get_cache_stats_tool(),
        create_clear_cache_tool(),
        create_delete_cached_file_tool(),
    ]
}

fn object_schema(properties: Vec<(&str, PropertySchema)>, required: &[&str]) -> JsonSchema {
    JsonSchema {
        schema_type: "object".to_string(),
        properties: if properties.is_empty() {
            None
        } else {
            Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.to_string(), schema))
                    .collect(),
            )
        },
        required: if required.is_empty() {
            None
        } else {
            Some(required.iter().map(|r| r.to_string()).collect())
        },
    }
}

fn create_get_best_power_tool() -> ToolSchema {
    ToolSchema {
        name: "get_best_power".to_string(),
        description: "Best average power a workout sustained for each duration".to_string(),
        input_schema: object_schema(
            vec![
                ("workout_id", PropertySchema::number("Workout identifier")),
                (
                    "durations",
                    PropertySchema::number_array(
                        "Durations in seconds (defaults to 5s, 15s, 30s, 1min, 5min, 10min, 20min, 30min, 60min)",
                    ),
                ),
            ],
            &["workout_id"],
        ),
    }
}

fn create_get_power_duration_curve_tool() -> ToolSchema {
    ToolSchema {
        name: "get_power_duration_curve".to_string(),
        description: "Best power per duration across all cycling workouts in a date range"
            .to_string(),
        input_schema: object_schema(
            vec![
                ("start_date", PropertySchema::string("First day, YYYY-MM-DD")),
                ("end_date", PropertySchema::string("Last day, YYYY-MM-DD")),
                (
                    "durations",
                    PropertySchema::number_array("Durations in seconds"),
                ),
                (
                    "exclude_workout_ids",
                    PropertySchema::number_array("Workouts to leave out of the curve"),
                ),
            ],
            &["start_date", "end_date"],
        ),
    }
}

fn create_get_aerobic_decoupling_tool() -> ToolSchema {
    ToolSchema {
        name: "get_aerobic_decoupling".to_string(),
        description: "Heart rate to power drift between the first and second half of a workout"
            .to_string(),
        input_schema: object_schema(
            vec![("workout_id", PropertySchema::number("Workout identifier"))],
            &["workout_id"],
        ),
    }
}

fn create_compare_intervals_tool() -> ToolSchema {
    ToolSchema {
        name: "compare_intervals".to_string(),
        description: "Align laps of several workouts by position and summarize each workout"
            .to_string(),
        input_schema: object_schema(
            vec![
                (
                    "workout_ids",
                    PropertySchema::number_array("Workouts to compare"),
                ),
                (
                    "min_power",
                    PropertySchema::number("Keep laps averaging at least this many watts"),
                ),
                (
                    "target_duration",
                    PropertySchema::number("Keep laps close to this duration in seconds"),
                ),
                (
                    "tolerance",
                    PropertySchema::number("Allowed deviation from target_duration in seconds"),
                ),
            ],
            &["workout_ids"],
        ),
    }
}

fn create_get_cache_stats_tool() -> ToolSchema {
    ToolSchema {
        name: "get_cache_stats".to_string(),
        description: "Size and location of the activity file cache".to_string(),
        input_schema: object_schema(vec![], &[]),
    }
}

fn create_clear_cache_tool() -> ToolSchema {
    ToolSchema {
        name: "clear_cache".to_string(),
        description: "Remove every cached activity file".to_string(),
        input_schema: object_schema(vec![], &[]),
    }
}

fn create_delete_cached_file_tool() -> ToolSchema {
    ToolSchema {
        name: "delete_cached_file".to_string(),
        description: "Remove one workout's cached activity file".to_string(),
        input_schema: object_schema(
            vec![("workout_id", PropertySchema::number("Workout identifier"))],
            &["workout_id"],
        ),
    }
}
