//! Integration tests for the Outlook MCP Server
//!
//! Graph and the identity platform are replaced by an in-process axum server
//! that records every request and answers from a canned response table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};

use outlook_mcp_server_rust::config::Config;
use outlook_mcp_server_rust::graph::auth::StaticToken;
use outlook_mcp_server_rust::graph::client::GraphClient;
use outlook_mcp_server_rust::mcp::tools::ToolHandler;
use outlook_mcp_server_rust::mcp::types::{CallToolResult, ToolResultContent};

/// A request seen by the mock server
#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Bytes,
}

impl Recorded {
    fn json_body(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responses: Arc<HashMap<String, (StatusCode, Value)>>,
}

async fn record(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let key = format!("{} {}", method, uri.path());
    state.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        query,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    match state.responses.get(&key) {
        Some((status, body)) if body.is_null() => (*status, Json(json!({}))).into_response(),
        Some((status, body)) => (*status, Json(body.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": "NoRoute", "message": key}})),
        )
            .into_response(),
    }
}

/// Mock server handle
struct MockGraph {
    base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockGraph {
    async fn start(responses: Vec<(&str, StatusCode, Value)>) -> Self {
        let state = MockState {
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(
                responses
                    .into_iter()
                    .map(|(k, s, v)| (k.to_string(), (s, v)))
                    .collect(),
            ),
        };
        let requests = state.requests.clone();

        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            requests,
        }
    }

    fn graph_url(&self) -> String {
        format!("{}/v1.0", self.base)
    }

    fn handler(&self) -> ToolHandler {
        let mut config = Config::with_dir(std::env::temp_dir().join("outlook-mcp-tests"));
        config.graph_base_url = self.graph_url();
        config.access_token = Some("test-token".to_string());

        let client = GraphClient::new(Arc::new(StaticToken("test-token".to_string())), self.graph_url());
        ToolHandler::with_client(config, Arc::new(client))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn text_of(result: &CallToolResult) -> &str {
    match &result.content[0] {
        ToolResultContent::Text { text } => text.as_str(),
    }
}

fn message(id: &str, has_attachments: bool) -> Value {
    json!({
        "id": id,
        "subject": format!("Assunto {}", id),
        "from": {"emailAddress": {"name": "Ana", "address": "ana@contoso.com"}},
        "receivedDateTime": "2024-05-01T12:00:00Z",
        "hasAttachments": has_attachments,
        "bodyPreview": "Prévia",
        "importance": "normal"
    })
}

mod mail_tool_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_emails_defaults_end_to_end() {
        let mock = MockGraph::start(vec![(
            "GET /v1.0/me/mailFolders/inbox/messages",
            StatusCode::OK,
            json!({"value": [message("m1", false), message("m2", true), message("m3", false)]}),
        )])
        .await;

        let result = mock.handler().call_tool("list_emails", json!({})).await.unwrap();
        assert!(!result.is_error, "{}", text_of(&result));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/v1.0/me/mailFolders/inbox/messages");
        assert_eq!(req.query.get("$top").map(String::as_str), Some("10"));
        assert_eq!(
            req.query.get("$orderby").map(String::as_str),
            Some("receivedDateTime desc")
        );
        assert!(!req.query.contains_key("$search"));
        assert_eq!(req.authorization.as_deref(), Some("Bearer test-token"));

        let emails: Vec<Value> = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(emails.len(), 3);
        for email in &emails {
            let mut keys: Vec<&str> = email.as_object().unwrap().keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(
                keys,
                vec!["from", "hasAttachments", "id", "preview", "received", "subject"]
            );
        }
        assert_eq!(emails[0]["from"], "ana@contoso.com");
        assert_eq!(emails[1]["hasAttachments"], true);
        assert_eq!(emails[2]["preview"], "Prévia");
    }

    #[tokio::test]
    async fn test_list_emails_with_search_and_folder() {
        let mock = MockGraph::start(vec![(
            "GET /v1.0/me/mailFolders/sentitems/messages",
            StatusCode::OK,
            json!({"value": []}),
        )])
        .await;

        let result = mock
            .handler()
            .call_tool(
                "list_emails",
                json!({"folder": "sentitems", "limit": 5, "search": "foo"}),
            )
            .await
            .unwrap();

        assert_eq!(text_of(&result), "[]");
        let req = &mock.requests()[0];
        assert_eq!(req.query.get("$search").map(String::as_str), Some("\"foo\""));
        assert_eq!(req.query.get("$top").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_read_email_without_attachments_makes_one_request() {
        let mock = MockGraph::start(vec![(
            "GET /v1.0/me/messages/msg-1",
            StatusCode::OK,
            message("msg-1", false),
        )])
        .await;

        let result = mock
            .handler()
            .call_tool("read_email", json!({"emailId": "msg-1"}))
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].query.get("$select").map(String::as_str),
            Some("subject,body,from,to,cc,receivedDateTime,hasAttachments")
        );

        let email: Value = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(email["subject"], "Assunto msg-1");
        assert_eq!(email["importance"], "normal");
        assert_eq!(email["attachments"], json!([]));
    }

    #[tokio::test]
    async fn test_read_email_merges_attachments() {
        let mock = MockGraph::start(vec![
            (
                "GET /v1.0/me/messages/msg-2",
                StatusCode::OK,
                message("msg-2", true),
            ),
            (
                "GET /v1.0/me/messages/msg-2/attachments",
                StatusCode::OK,
                json!({"value": [
                    {"name": "a.pdf", "size": 1024, "contentType": "application/pdf"},
                    {"name": "b.png", "size": 2048, "contentType": "image/png"}
                ]}),
            ),
        ])
        .await;

        let result = mock
            .handler()
            .call_tool("read_email", json!({"emailId": "msg-2"}))
            .await
            .unwrap();

        assert_eq!(mock.requests().len(), 2);
        let email: Value = serde_json::from_str(text_of(&result)).unwrap();
        let attachments = email["attachments"].as_array().unwrap();
        assert_eq!(attachments.len(), 2);
        assert_eq!(
            attachments[1],
            json!({"name": "b.png", "size": 2048, "contentType": "image/png"})
        );
    }

    #[tokio::test]
    async fn test_send_email_omits_empty_cc() {
        let mock = MockGraph::start(vec![("POST /v1.0/me/sendMail", StatusCode::ACCEPTED, Value::Null)]).await;

        let result = mock
            .handler()
            .call_tool(
                "send_email",
                json!({"to": ["bob@contoso.com"], "subject": "Oi", "body": "Olá", "cc": []}),
            )
            .await
            .unwrap();

        assert_eq!(text_of(&result), "Email enviado com sucesso!");
        let body = mock.requests()[0].json_body();
        assert_eq!(body["saveToSentItems"], true);
        assert_eq!(body["message"]["body"]["contentType"], "Text");
        assert_eq!(
            body["message"]["toRecipients"],
            json!([{"emailAddress": {"address": "bob@contoso.com"}}])
        );
        assert!(body["message"].get("ccRecipients").is_none());
    }

    #[tokio::test]
    async fn test_send_email_with_cc_and_html() {
        let mock = MockGraph::start(vec![("POST /v1.0/me/sendMail", StatusCode::ACCEPTED, Value::Null)]).await;

        mock.handler()
            .call_tool(
                "send_email",
                json!({
                    "to": ["bob@contoso.com"],
                    "subject": "Oi",
                    "body": "<p>Olá</p>",
                    "cc": ["carol@contoso.com", "dave@contoso.com"],
                    "isHtml": true
                }),
            )
            .await
            .unwrap();

        let body = mock.requests()[0].json_body();
        assert_eq!(body["message"]["body"]["contentType"], "HTML");
        let cc = body["message"]["ccRecipients"].as_array().unwrap();
        assert_eq!(cc.len(), 2);
        assert_eq!(cc[0]["emailAddress"]["address"], "carol@contoso.com");
        assert_eq!(cc[1]["emailAddress"]["address"], "dave@contoso.com");
    }

    #[tokio::test]
    async fn test_send_email_missing_required_field() {
        let mock = MockGraph::start(vec![]).await;

        let result = mock
            .handler()
            .call_tool("send_email", json!({"to": ["bob@contoso.com"], "subject": "Oi"}))
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(text_of(&result).starts_with("Erro: Erro ao enviar email: Argumentos inválidos"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remote_error_is_text_result() {
        let mock = MockGraph::start(vec![(
            "GET /v1.0/me/messages/missing",
            StatusCode::NOT_FOUND,
            json!({"error": {"code": "ErrorItemNotFound", "message": "The specified object was not found in the store."}}),
        )])
        .await;

        let result = mock
            .handler()
            .call_tool("read_email", json!({"emailId": "missing"}))
            .await
            .unwrap();

        assert!(result.is_error);
        assert_eq!(
            text_of(&result),
            "Erro: Erro ao ler email: ErrorItemNotFound: The specified object was not found in the store. (HTTP 404)"
        );
    }
}

mod calendar_tool_tests {
    use super::*;

    fn event(id: &str) -> Value {
        json!({
            "id": id,
            "subject": "Planejamento",
            "start": {"dateTime": "2024-06-03T09:00:00.0000000", "timeZone": "UTC"},
            "end": {"dateTime": "2024-06-03T10:00:00.0000000", "timeZone": "UTC"},
            "location": {"displayName": "Sala 1"},
            "isOnlineMeeting": false,
            "organizer": {"emailAddress": {"name": "Ana", "address": "ana@contoso.com"}}
        })
    }

    #[tokio::test]
    async fn test_list_events_with_range() {
        let mock = MockGraph::start(vec![(
            "GET /v1.0/me/events",
            StatusCode::OK,
            json!({"value": [event("e1"), event("e2")]}),
        )])
        .await;

        let result = mock
            .handler()
            .call_tool(
                "list_calendar_events",
                json!({"startDate": "2024-06-01T00:00:00", "endDate": "2024-06-30T23:59:59"}),
            )
            .await
            .unwrap();

        let req = &mock.requests()[0];
        assert_eq!(req.query.get("$top").map(String::as_str), Some("20"));
        assert_eq!(
            req.query.get("$filter").map(String::as_str),
            Some("start/dateTime ge '2024-06-01T00:00:00' and end/dateTime le '2024-06-30T23:59:59'")
        );
        assert_eq!(req.query.get("$orderby").map(String::as_str), Some("start/dateTime"));

        let events: Vec<Value> = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            json!({
                "id": "e1",
                "subject": "Planejamento",
                "start": "2024-06-03T09:00:00.0000000",
                "end": "2024-06-03T10:00:00.0000000",
                "location": "Sala 1",
                "isOnlineMeeting": false,
                "organizer": "ana@contoso.com"
            })
        );
    }

    #[tokio::test]
    async fn test_list_events_needs_both_dates_for_filter() {
        let mock = MockGraph::start(vec![("GET /v1.0/me/events", StatusCode::OK, json!({"value": []}))]).await;

        mock.handler()
            .call_tool(
                "list_calendar_events",
                json!({"startDate": "2024-06-01T00:00:00", "limit": 3}),
            )
            .await
            .unwrap();

        let req = &mock.requests()[0];
        assert!(!req.query.contains_key("$filter"));
        assert_eq!(req.query.get("$top").map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn test_create_event_uses_fixed_time_zone() {
        let mock = MockGraph::start(vec![(
            "POST /v1.0/me/events",
            StatusCode::CREATED,
            json!({"id": "evt-9", "subject": "Reunião"}),
        )])
        .await;

        let result = mock
            .handler()
            .call_tool(
                "create_calendar_event",
                json!({
                    "subject": "Reunião",
                    "start": "2024-06-03T09:00:00Z",
                    "end": "2024-06-03T10:00:00+01:00",
                    "attendees": ["bob@contoso.com"]
                }),
            )
            .await
            .unwrap();

        assert_eq!(text_of(&result), "Evento criado com sucesso! ID: evt-9");

        let body = mock.requests()[0].json_body();
        assert_eq!(body["start"]["timeZone"], "America/Sao_Paulo");
        assert_eq!(body["end"]["timeZone"], "America/Sao_Paulo");
        assert_eq!(body["start"]["dateTime"], "2024-06-03T09:00:00Z");
        assert_eq!(body["body"], json!({"contentType": "HTML", "content": ""}));
        assert_eq!(body["location"]["displayName"], "");
        assert_eq!(body["isOnlineMeeting"], false);
        assert_eq!(
            body["attendees"],
            json!([{"emailAddress": {"address": "bob@contoso.com"}, "type": "required"}])
        );
    }

    #[tokio::test]
    async fn test_create_event_without_attendees() {
        let mock = MockGraph::start(vec![(
            "POST /v1.0/me/events",
            StatusCode::CREATED,
            json!({"id": "evt-10"}),
        )])
        .await;

        mock.handler()
            .call_tool(
                "create_calendar_event",
                json!({"subject": "Foco", "start": "2024-06-03T09:00:00", "end": "2024-06-03T10:00:00", "isOnline": true}),
            )
            .await
            .unwrap();

        let body = mock.requests()[0].json_body();
        assert!(body.get("attendees").is_none());
        assert_eq!(body["isOnlineMeeting"], true);
    }
}

mod dispatch_tests {
    use super::*;
    use outlook_mcp_server_rust::config::ConfigRecord;
    use outlook_mcp_server_rust::error::{AuthError, ConfigError, GraphMcpError};

    #[tokio::test]
    async fn test_unknown_tool_is_text_result() {
        let mock = MockGraph::start(vec![]).await;

        let result = mock
            .handler()
            .call_tool("delete_mailbox", json!({}))
            .await
            .unwrap();

        assert!(result.is_error);
        assert_eq!(text_of(&result), "Erro: Ferramenta desconhecida: delete_mailbox");
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ToolHandler::new(Config::with_dir(dir.path()));

        let err = handler.call_tool("delete_mailbox", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            GraphMcpError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_config_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_dir(dir.path());
        std::fs::write(&config.config_path, "{\"clientId\": 42}").unwrap();

        let err = ToolHandler::new(config)
            .call_tool("list_emails", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphMcpError::Config(ConfigError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_failure_propagates_and_is_retried() {
        let busy = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = busy.local_addr().unwrap().port();

        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_dir(dir.path());
        let mut record = ConfigRecord::new("client-1", "tenant-1");
        record.redirect_uri = format!("http://localhost:{}/auth/callback", port);
        record.save(&config.config_path).unwrap();

        let handler = ToolHandler::new(config);
        for _ in 0..2 {
            let err = handler
                .call_tool("list_emails", json!({}))
                .await
                .unwrap_err();
            assert!(
                matches!(err, GraphMcpError::Auth(AuthError::CallbackError { .. })),
                "{}",
                err
            );
        }
    }

    #[tokio::test]
    async fn test_bootstrap_with_static_token() {
        let mock = MockGraph::start(vec![("GET /v1.0/me/events", StatusCode::OK, json!({"value": []}))]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_dir(dir.path());
        config.graph_base_url = mock.graph_url();
        config.access_token = Some("env-token".to_string());

        let handler = ToolHandler::new(config);
        handler.call_tool("list_calendar_events", json!({})).await.unwrap();
        handler.call_tool("list_calendar_events", json!({})).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer env-token")));
    }

    #[tokio::test]
    async fn test_bootstrap_with_cached_token() {
        let mock = MockGraph::start(vec![("GET /v1.0/me/events", StatusCode::OK, json!({"value": []}))]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_dir(dir.path());
        config.graph_base_url = mock.graph_url();
        ConfigRecord::new("client-1", "tenant-1").save(&config.config_path).unwrap();
        std::fs::write(
            &config.token_cache_path,
            json!({"access_token": "cached-token", "refresh_token": null, "token_type": "Bearer", "scope": ""}).to_string(),
        )
        .unwrap();

        let result = ToolHandler::new(config)
            .call_tool("list_calendar_events", json!({}))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            mock.requests()[0].authorization.as_deref(),
            Some("Bearer cached-token")
        );
    }
}

mod auth_tests {
    use super::*;
    use outlook_mcp_server_rust::config::ConfigRecord;
    use outlook_mcp_server_rust::graph::auth::{Authenticator, TokenProvider};

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_cached() {
        let mock = MockGraph::start(vec![(
            "POST /tenant-1/oauth2/v2.0/token",
            StatusCode::OK,
            json!({
                "access_token": "new-token",
                "refresh_token": "r2",
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "https://graph.microsoft.com/.default"
            }),
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_dir(dir.path());
        config.authority_url = mock.base.clone();
        ConfigRecord::new("client-1", "tenant-1").save(&config.config_path).unwrap();
        std::fs::write(
            &config.token_cache_path,
            json!({"access_token": "old-token", "refresh_token": "r1", "token_type": "Bearer", "expiry_date": 0, "scope": ""}).to_string(),
        )
        .unwrap();

        let auth = Authenticator::new(&config).await.unwrap();
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.access_token().await.unwrap(), "new-token");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let form = String::from_utf8(requests[0].body.to_vec()).unwrap();
        assert!(form.contains("grant_type=refresh_token"));
        assert!(form.contains("refresh_token=r1"));
        assert!(form.contains("client_id=client-1"));

        let cache = std::fs::read_to_string(&config.token_cache_path).unwrap();
        assert!(cache.contains("new-token"));
        assert!(cache.contains("r2"));

        // Fresh now, so no second refresh
        assert_eq!(auth.access_token().await.unwrap(), "new-token");
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_authenticator_requires_config_record() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Authenticator::new(&Config::with_dir(dir.path())).await.is_err());
    }
}

mod mcp_server_tests {
    use super::*;
    use outlook_mcp_server_rust::mcp::server::McpServer;

    #[tokio::test]
    async fn test_stdio_session() {
        let mock = MockGraph::start(vec![]).await;
        let mut server = McpServer::new(mock.handler());

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05", "clientInfo": {"name": "test", "version": "1"}, "capabilities": {}}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": "c-3", "method": "tools/call", "params": {"name": "nope", "arguments": {}}}),
        ]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n");

        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        assert!(server.is_initialized());

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "outlook");

        let tools = responses[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[2]["name"], "send_email");
        assert_eq!(tools[2]["inputSchema"]["required"], json!(["to", "subject", "body"]));
        assert_eq!(tools[0]["inputSchema"]["properties"]["limit"]["default"], 10);

        assert_eq!(responses[2]["id"], "c-3");
        assert!(responses[2].get("error").is_none());
        assert_eq!(responses[2]["result"]["isError"], true);
        assert!(responses[2]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Ferramenta desconhecida"));
    }

    #[tokio::test]
    async fn test_ping_over_mock_io() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .build();
        let writer = tokio_test::io::Builder::new()
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
            .build();

        let mock = MockGraph::start(vec![]).await;
        let mut server = McpServer::new(mock.handler());
        server
            .serve(tokio::io::BufReader::new(reader), writer)
            .await
            .unwrap();
    }
}
