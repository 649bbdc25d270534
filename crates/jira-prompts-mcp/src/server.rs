//! MCP server implementation.
//!
//! The server handles the MCP protocol lifecycle:
//! 1. Initialize - exchange capabilities
//! 2. List and render prompts via the dispatcher
//! 3. Shutdown on EOF

use jira_prompts_core::Result;
use serde_json::Value;

use crate::prompts::{prompt_definitions, PromptDispatcher};
use crate::protocol::{
    GetPromptParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, PromptsCapability, PromptsListResult, RequestId, ServerCapabilities,
    ServerInfo, MCP_VERSION,
};
use crate::transport::{IncomingMessage, StdioTransport};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "jira-prompts";

/// MCP server exposing Jira prompts.
pub struct McpServer {
    dispatcher: PromptDispatcher,
    initialized: bool,
}

impl McpServer {
    pub fn new(dispatcher: PromptDispatcher) -> Self {
        Self {
            dispatcher,
            initialized: false,
        }
    }

    /// Run the server on stdin/stdout until EOF.
    pub async fn run(&mut self) -> Result<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Run the main loop on an arbitrary transport.
    pub async fn serve(&mut self, transport: &mut StdioTransport) -> Result<()> {
        tracing::info!("Starting MCP server");

        loop {
            let message = match transport.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::info!("EOF received, shutting down");
                    break;
                }
                Err(e) => {
                    tracing::error!("Transport error: {}", e);
                    break;
                }
            };

            if let Some(response) = self.handle_message(message).await {
                if let Err(e) = transport.write_response(&response).await {
                    tracing::error!("Failed to write response: {}", e);
                    break;
                }
            }
        }

        tracing::info!("MCP server stopped");
        Ok(())
    }

    /// Handle an incoming message.
    async fn handle_message(&mut self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(&notif.method);
                None
            }
            IncomingMessage::Malformed(line) => Some(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::parse_error(&line),
            )),
        }
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Handling request: {} (id: {:?})", req.method, req.id);

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id, req.params),
            "ping" => JsonRpcResponse::success(req.id, serde_json::json!({})),
            "prompts/list" => JsonRpcResponse::from_result(
                req.id,
                &PromptsListResult {
                    prompts: prompt_definitions(),
                },
            ),
            "prompts/get" => self.handle_prompts_get(req.id, req.params).await,
            method => {
                tracing::warn!("Unknown method: {}", method);
                JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(method))
            }
        }
    }

    /// Handle notifications (no response).
    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => tracing::debug!("Request cancelled by client"),
            _ => tracing::debug!("Ignoring notification: {}", method),
        }
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if self.initialized {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Server already initialized"),
            );
        }

        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init) => tracing::info!(
                    "Client: {} v{} (protocol: {})",
                    init.client_info.name,
                    init.client_info.version,
                    init.protocol_version
                ),
                Err(e) => tracing::warn!("Failed to parse initialize params: {}", e),
            }
        }

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                prompts: Some(PromptsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_prompts_get(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: GetPromptParams = match params.map(serde_json::from_value::<GetPromptParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params(&e.to_string()))
            }
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"))
            }
        };

        let arguments = params.arguments.unwrap_or_default();
        match self.dispatcher.dispatch(&params.name, &arguments).await {
            Ok(result) => JsonRpcResponse::from_result(id, &result),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::from(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::DispatchSettings;
    use crate::protocol::{GetPromptResult, JSONRPC_VERSION};
    use async_trait::async_trait;
    use jira_prompts_core::{Error, IssueRecord, IssueTracker};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::BufReader;

    /// Tracker serving one fixed issue and counting calls.
    struct FixtureTracker {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl IssueTracker for FixtureTracker {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn fetch_issue(&self, key: &str) -> Result<IssueRecord> {
            *self.calls.lock().unwrap() += 1;
            if key != "PROJ-1" {
                return Err(Error::NotFound(format!("Issue {} does not exist", key)));
            }
            Ok(serde_json::from_value(json!({
                "key": "PROJ-1",
                "fields": {"summary": "Login fails", "status": {"name": "Open"}, "assignee": null}
            }))
            .unwrap())
        }

        async fn search_issues(&self, _query: &str, _max: u32) -> Result<Vec<IssueRecord>> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![])
        }
    }

    fn server() -> (McpServer, Arc<FixtureTracker>) {
        let tracker = Arc::new(FixtureTracker {
            calls: Mutex::new(0),
        });
        let dispatcher = PromptDispatcher::new(tracker.clone(), DispatchSettings::default());
        (McpServer::new(dispatcher), tracker)
    }

    fn request(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(id),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize_advertises_prompts() {
        let (mut server, _) = server();
        let resp = server
            .handle_request(request(
                1,
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                })),
            ))
            .await;

        let result = resp.result.unwrap();
        assert_eq!(result["capabilities"], json!({"prompts": {"listChanged": false}}));
        assert_eq!(result["serverInfo"]["name"], json!(SERVER_NAME));
        assert!(server.initialized);

        let again = server.handle_initialize(RequestId::Number(2), None);
        assert_eq!(again.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_prompts_list() {
        let (mut server, _) = server();
        let resp = server.handle_request(request(1, "prompts/list", None)).await;

        let result: PromptsListResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.prompts.len(), 3);
        assert_eq!(result.prompts[0].name, "jira-issue-brief");
    }

    #[tokio::test]
    async fn test_prompts_get() {
        let (mut server, tracker) = server();
        let resp = server
            .handle_request(request(
                7,
                "prompts/get",
                Some(json!({"name": "jira-issue-brief", "arguments": {"issue-key": "PROJ-1"}})),
            ))
            .await;

        assert!(resp.error.is_none());
        let result: GetPromptResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        let document: Value = serde_json::from_str(result.text().unwrap()).unwrap();
        assert_eq!(document["status"], json!("Open"));
        assert_eq!(document["assignee"], json!("Unassigned"));
        assert_eq!(*tracker.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prompts_get_errors() {
        let (mut server, tracker) = server();

        let resp = server
            .handle_request(request(
                1,
                "prompts/get",
                Some(json!({"name": "nope", "arguments": {"issue-key": "PROJ-1"}})),
            ))
            .await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(*tracker.calls.lock().unwrap(), 0);

        let resp = server.handle_request(request(2, "prompts/get", None)).await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let resp = server
            .handle_request(request(3, "prompts/get", Some(json!("not an object"))))
            .await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let resp = server
            .handle_request(request(
                4,
                "prompts/get",
                Some(json!({"name": "jira-issue-brief", "arguments": {"issue-key": "GONE-1"}})),
            ))
            .await;
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INVALID_PARAMS);
        assert!(error.message.contains("GONE-1"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (mut server, _) = server();
        let resp = server.handle_request(request(1, "tools/list", None)).await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_and_malformed() {
        let (mut server, _) = server();

        let msg = IncomingMessage::Notification(crate::protocol::JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "notifications/initialized".to_string(),
            params: None,
        });
        assert!(server.handle_message(msg).await.is_none());

        let resp = server
            .handle_message(IncomingMessage::Malformed("{oops".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.id, RequestId::Null);
        assert_eq!(resp.error.unwrap().code, JsonRpcError::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let (mut server, _) = server();
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
        ]
        .join("\n");
        let reader = BufReader::new(std::io::Cursor::new(input.into_bytes()));
        let mut transport = StdioTransport::new(Box::new(reader), Box::new(tokio::io::sink()));

        server.serve(&mut transport).await.unwrap();
        assert!(server.initialized);
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8() {
        use tokio::io::AsyncReadExt;

        let (mut server, _) = server();
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"prompts/list\"}\n");

        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        let reader = BufReader::new(std::io::Cursor::new(input));
        let mut transport = StdioTransport::new(Box::new(reader), Box::new(writer));
        server.serve(&mut transport).await.unwrap();
        drop(transport);

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        let responses: Vec<JsonRpcResponse> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[1].id, RequestId::Null);
        assert_eq!(
            responses[1].error.as_ref().unwrap().code,
            JsonRpcError::PARSE_ERROR
        );
        assert_eq!(responses[3].id, RequestId::Number(3));
        assert!(responses[3].result.is_some());
    }
}
