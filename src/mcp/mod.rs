// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # MCP Server
//!
//! Line-delimited JSON-RPC 2.0 over stdio or TCP. Each line is one request;
//! each request with an id gets exactly one response line. Notifications are
//! accepted and never answered.

pub mod schema;

use anyhow::Result;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::constants::errors::*;
use crate::constants::protocol::{
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
};
use crate::intelligence::intervals::LapFilters;
use crate::logging::AppLogger;
use crate::mcp::schema::{get_tools, InitializeResponse, ToolCallResult, ToolsListResponse};
use crate::service::AnalysisService;

pub struct McpServer {
    service: Arc<AnalysisService>,
}

#[derive(Debug, Deserialize)]
pub struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct McpResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
    id: Value,
}

#[derive(Debug, Serialize)]
pub struct McpError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl McpError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl McpResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BestPowerArgs {
    workout_id: u64,
    #[serde(default)]
    durations: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct PowerCurveArgs {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    durations: Vec<u32>,
    #[serde(default)]
    exclude_workout_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct WorkoutArgs {
    workout_id: u64,
}

#[derive(Debug, Deserialize)]
struct CompareIntervalsArgs {
    workout_ids: Vec<u64>,
    #[serde(flatten)]
    filters: LapFilters,
}

impl McpServer {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self { service }
    }

    /// Serve a single client on stdin/stdout until stdin closes
    pub async fn run_stdio(self) -> Result<()> {
        info!("MCP server listening on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    pub async fn run_tcp(self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        info!("MCP server listening on port {}", port);

        let server = Arc::new(self);
        loop {
            let (socket, addr) = listener.accept().await?;
            info!("New connection from {}", addr);

            let server = server.clone();
            tokio::spawn(async move {
                let (reader, writer) = socket.into_split();
                if let Err(e) = server.serve(BufReader::new(reader), writer).await {
                    warn!("Connection from {} closed with error: {}", addr, e);
                }
            });
        }
    }

    /// Answer requests line by line until the reader is exhausted
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_message(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Handle one raw JSON-RPC line, returning the serialized response
    pub async fn handle_message(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<McpRequest>(line) {
            Ok(request) => {
                let Some(id) = request.id.clone() else {
                    debug!("Notification received: {}", request.method);
                    return None;
                };
                self.handle_request(request, id).await
            }
            Err(e) => {
                warn!("Unparseable request: {}", e);
                McpResponse::failure(Value::Null, McpError::new(ERROR_PARSE, MSG_PARSE_ERROR))
            }
        };

        match serde_json::to_string(&response) {
            Ok(serialized) => Some(serialized),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                None
            }
        }
    }

    async fn handle_request(&self, request: McpRequest, id: Value) -> McpResponse {
        match request.method.as_str() {
            "initialize" => {
                let init_response = InitializeResponse::new(
                    MCP_PROTOCOL_VERSION.to_string(),
                    SERVER_NAME.to_string(),
                    SERVER_VERSION.to_string(),
                );
                respond(id, &init_response)
            }
            "ping" => McpResponse::success(id, serde_json::json!({})),
            "tools/list" => respond(id, &ToolsListResponse { tools: get_tools() }),
            "tools/call" => {
                let params = request.params.unwrap_or_default();
                let Some(tool_name) = params["name"].as_str() else {
                    return McpResponse::failure(
                        id,
                        McpError::new(ERROR_INVALID_PARAMS, MSG_INVALID_PARAMS),
                    );
                };
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);

                let started = Instant::now();
                let outcome = self.handle_tool_call(tool_name, args).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(result) => {
                        AppLogger::log_tool_call(tool_name, !result.is_error, duration_ms);
                        respond(id, &result)
                    }
                    Err(error) => {
                        AppLogger::log_tool_call(tool_name, false, duration_ms);
                        McpResponse::failure(id, error)
                    }
                }
            }
            _ => McpResponse::failure(
                id,
                McpError::new(ERROR_METHOD_NOT_FOUND, MSG_METHOD_NOT_FOUND),
            ),
        }
    }

    /// Run a tool
    ///
    /// Malformed arguments and unknown tools are protocol errors; analysis
    /// failures are tool results flagged with `isError`.
    async fn handle_tool_call(
        &self,
        tool_name: &str,
        args: Value,
    ) -> Result<ToolCallResult, McpError> {
        let service = &self.service;

        let result = match tool_name {
            "get_best_power" => {
                let args: BestPowerArgs = parse_args(args)?;
                to_tool_result(service.get_best_power(args.workout_id, &args.durations).await)
            }
            "get_power_duration_curve" => {
                let args: PowerCurveArgs = parse_args(args)?;
                if args.start_date > args.end_date {
                    return Err(McpError::new(
                        ERROR_INVALID_PARAMS,
                        "start_date must not be after end_date",
                    ));
                }
                let excluded: HashSet<u64> = args.exclude_workout_ids.into_iter().collect();
                to_tool_result(
                    service
                        .power_duration_curve_for_range(
                            args.start_date,
                            args.end_date,
                            &args.durations,
                            &excluded,
                        )
                        .await,
                )
            }
            "get_aerobic_decoupling" => {
                let args: WorkoutArgs = parse_args(args)?;
                to_tool_result(service.get_aerobic_decoupling(args.workout_id).await)
            }
            "compare_intervals" => {
                let args: CompareIntervalsArgs = parse_args(args)?;
                if args.workout_ids.is_empty() {
                    return Err(McpError::new(
                        ERROR_INVALID_PARAMS,
                        "workout_ids must not be empty",
                    ));
                }
                json_result(&service.compare_intervals(&args.workout_ids, args.filters).await)
            }
            "get_cache_stats" => json_result(&service.cache_stats().await),
            "clear_cache" => json_result(&service.clear_cache().await),
            "delete_cached_file" => {
                let args: WorkoutArgs = parse_args(args)?;
                let deleted = service.delete_cached_file(args.workout_id).await;
                json_result(&serde_json::json!({
                    "workout_id": args.workout_id,
                    "deleted": deleted,
                }))
            }
            _ => {
                return Err(McpError::new(
                    ERROR_METHOD_NOT_FOUND,
                    format!("{}: {}", MSG_UNKNOWN_TOOL, tool_name),
                ))
            }
        };

        Ok(result)
    }
}

fn respond<T: Serialize>(id: Value, result: &T) -> McpResponse {
    match serde_json::to_value(result) {
        Ok(value) => McpResponse::success(id, value),
        Err(e) => McpResponse::failure(id, McpError::new(ERROR_INTERNAL_ERROR, e.to_string())),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, McpError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| McpError::new(ERROR_INVALID_PARAMS, format!("{}: {}", MSG_INVALID_PARAMS, e)))
}

fn json_result<T: Serialize>(value: &T) -> ToolCallResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolCallResult::text(text),
        Err(e) => ToolCallResult::error(format!("Failed to serialize result: {}", e)),
    }
}

fn to_tool_result<T: Serialize, E: std::fmt::Display>(outcome: Result<T, E>) -> ToolCallResult {
    match outcome {
        Ok(value) => json_result(&value),
        Err(e) => ToolCallResult::error(e.to_string()),
    }
}
