//! Integration tests for the MCP gateway.
//!
//! Drives `GatewayServer::serve` over an in-process duplex stream with a
//! recording transport, exercising framing, navigation and tool routing
//! end-to-end.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use superops_mcp::client::Result as ClientResult;
use superops_mcp::{
    ClientProvider, ConfigError, Credentials, GatewayServer, GraphqlTransport, Region,
};

// ── Recording transport ──────────────────────────────────────────────

#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl RecordingTransport {
    fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphqlTransport for RecordingTransport {
    async fn execute(&self, operation: &str, variables: Option<Value>) -> ClientResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), variables));
        Ok(json!({"items": [{"id": "1"}]}))
    }
}

// ── Test harness ─────────────────────────────────────────────────────

struct Session {
    writer: tokio::io::WriteHalf<DuplexStream>,
    lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
    _server: tokio::task::JoinHandle<()>,
}

impl Session {
    fn start(provider: ClientProvider) -> Self {
        let (server_side, client_side) = tokio::io::duplex(65536);
        let server = GatewayServer::with_provider(provider);
        let handle = tokio::spawn(async move {
            let (read, write) = tokio::io::split(server_side);
            server.serve(BufReader::new(read), write).await.unwrap();
        });
        let (read, writer) = tokio::io::split(client_side);
        Self {
            writer,
            lines: BufReader::new(read).lines(),
            _server: handle,
        }
    }

    async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("server closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn call(&mut self, id: i64, name: &str, arguments: Value) -> Value {
        let response = self
            .request(id, "tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        response["result"].clone()
    }

    async fn tool_names(&mut self, id: i64) -> Vec<String> {
        let response = self.request(id, "tools/list", json!({})).await;
        response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }
}

fn configured(transport: Arc<RecordingTransport>) -> ClientProvider {
    ClientProvider::with_factory(
        || Ok(Credentials::new("token", "acme").with_region(Region::Eu)),
        move |_| Arc::clone(&transport) as Arc<dyn GraphqlTransport>,
    )
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_and_initial_menu() {
    let mut session = Session::start(configured(Arc::default()));

    let init = session
        .request(1, "initialize", json!({"protocolVersion": "2024-11-05", "capabilities": {}}))
        .await;
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["capabilities"]["tools"]["listChanged"], true);

    session
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;

    let pong = session.request(2, "ping", Value::Null).await;
    assert_eq!(pong["result"], json!({}));

    assert_eq!(session.tool_names(3).await, vec!["test_connection", "navigate"]);
}

#[tokio::test]
async fn navigate_emits_list_changed_after_response() {
    let mut session = Session::start(configured(Arc::default()));

    let result = session.call(1, "navigate", json!({"domain": "tickets"})).await;
    assert!(result.get("isError").is_none());
    assert!(text(&result).starts_with("Navigated to tickets domain."));

    let notification = session.recv().await;
    assert_eq!(notification["method"], "notifications/tools/list_changed");
    assert!(notification.get("id").is_none());

    let names = session.tool_names(2).await;
    assert_eq!(names.len(), 8);
    assert_eq!(names[1], "back");

    session.call(3, "back", json!({})).await;
    assert_eq!(
        session.recv().await["method"],
        "notifications/tools/list_changed"
    );
    assert_eq!(session.tool_names(4).await, vec!["test_connection", "navigate"]);
}

#[tokio::test]
async fn fallback_call_reaches_transport_and_switches_menu() {
    let transport = Arc::new(RecordingTransport::default());
    let mut session = Session::start(configured(Arc::clone(&transport)));

    let result = session
        .call(1, "superops_clients_search", json!({"query": "contoso", "max": 5}))
        .await;
    assert!(result.get("isError").is_none());
    assert!(text(&result).contains("\"items\""));
    assert_eq!(
        session.recv().await["method"],
        "notifications/tools/list_changed"
    );

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let variables = calls[0].1.clone().unwrap();
    assert_eq!(variables["input"]["first"], 5);
    assert_eq!(
        variables["input"]["filter"]["or"][0],
        json!({"name": {"contains": "contoso"}})
    );

    let names = session.tool_names(2).await;
    assert!(names.contains(&"superops_clients_get".to_string()));

    // Staying in the domain produces no notification; the next line is the ping response.
    session.call(3, "superops_clients_get", json!({"clientId": "c-1"})).await;
    let response = session.request(4, "ping", Value::Null).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_connection_reports_region() {
    let mut session = Session::start(configured(Arc::default()));
    let result = session.call(1, "test_connection", json!({})).await;
    assert_eq!(
        text(&result),
        "Successfully connected to SuperOps (subdomain: acme, region: eu)"
    );
}

#[tokio::test]
async fn unconfigured_gateway_still_navigates() {
    let provider = ClientProvider::with_factory(
        || Err(ConfigError::NotConfigured),
        |_| Arc::new(RecordingTransport::default()) as Arc<dyn GraphqlTransport>,
    );
    let mut session = Session::start(provider);

    let result = session.call(1, "superops_assets_list", json!({})).await;
    assert_eq!(result["isError"], true);
    assert!(text(&result).contains("SUPEROPS_API_TOKEN"));

    let result = session.call(2, "navigate", json!({"domain": "assets"})).await;
    assert!(result.get("isError").is_none());
    session.recv().await;
    assert_eq!(session.tool_names(3).await.len(), 6);
}

#[tokio::test]
async fn protocol_errors() {
    let mut session = Session::start(configured(Arc::default()));

    session.send_raw("{not json").await;
    let response = session.recv().await;
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    session.send_raw(r#"{"jsonrpc":"2.0","id":9,"params":{}}"#).await;
    let response = session.recv().await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 9);

    let response = session.request(1, "prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);

    let response = session.request(2, "tools/call", json!({"arguments": {}})).await;
    assert_eq!(response["error"]["code"], -32602);

    let result = session.call(3, "superops_billing_list", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        text(&result),
        "Unknown tool: superops_billing_list. Use 'navigate' to select a domain first."
    );
}
