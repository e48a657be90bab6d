mod common;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use ocrmcp::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use ocrmcp::{ResponseFormat, ToolServer};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use common::{dispatcher, png_base64, FixedClassifier};

fn server(format: ResponseFormat) -> ToolServer {
    ToolServer::new(dispatcher(FixedClassifier::new("ab12cd")), format)
}

async fn exchange(server: &ToolServer, frame: Value) -> Value {
    let reply = server
        .handle_line(&frame.to_string())
        .await
        .expect("request should be answered");
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn initialize_reports_protocol_and_capabilities() {
    let reply = exchange(
        &server(ResponseFormat::Json),
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
    )
    .await;
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
    assert!(reply["result"]["capabilities"]["tools"].is_object());
    assert_eq!(reply["result"]["serverInfo"]["name"], json!("ocrmcp"));
}

#[tokio::test]
async fn notifications_get_no_reply() {
    let server = server(ResponseFormat::Json);
    let frame = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(server.handle_line(&frame.to_string()).await.is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn malformed_frames_and_unknown_methods() {
    let server = server(ResponseFormat::Json);

    let reply: Value = serde_json::from_str(&server.handle_line("{not json").await.unwrap()).unwrap();
    assert_eq!(reply["error"]["code"], json!(PARSE_ERROR));
    assert_eq!(reply["id"], Value::Null);

    let reply = exchange(&server, json!({ "jsonrpc": "2.0", "id": "x", "method": "resources/list" })).await;
    assert_eq!(reply["error"]["code"], json!(METHOD_NOT_FOUND));
    assert_eq!(reply["id"], json!("x"));

    let reply = exchange(
        &server,
        json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { "arguments": {} } }),
    )
    .await;
    assert_eq!(reply["error"]["code"], json!(INVALID_PARAMS));
}

#[tokio::test]
async fn wrong_or_missing_jsonrpc_version_is_invalid() {
    let server = server(ResponseFormat::Json);

    let reply = exchange(&server, json!({ "jsonrpc": "1.0", "id": 7, "method": "ping" })).await;
    assert_eq!(reply["error"]["code"], json!(INVALID_REQUEST));
    assert_eq!(reply["id"], json!(7));

    let reply = exchange(&server, json!({ "id": 8, "method": "tools/list" })).await;
    assert_eq!(reply["error"]["code"], json!(INVALID_REQUEST));
    assert!(reply.get("result").is_none());
}

#[tokio::test]
async fn tools_list_exposes_every_tool() {
    let reply = exchange(
        &server(ResponseFormat::Json),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
    )
    .await;
    let tools = reply["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 4);
    assert!(tools.iter().all(|tool| tool["inputSchema"]["type"] == json!("object")));
}

#[tokio::test]
async fn tools_call_wraps_the_envelope_as_text() {
    let reply = exchange(
        &server(ResponseFormat::Json),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "captcha_recognize", "arguments": { "image_data": png_base64(80, 30) } }
        }),
    )
    .await;
    let result = &reply["result"];
    assert_eq!(result["isError"], json!(false));
    assert_eq!(result["content"][0]["type"], json!("text"));
    let envelope: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["payload"]["result"], json!("ab12cd"));
}

#[tokio::test]
async fn failed_calls_set_is_error() {
    let reply = exchange(
        &server(ResponseFormat::Summary),
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "captcha_recognize", "arguments": {} }
        }),
    )
    .await;
    assert_eq!(reply["result"]["isError"], json!(true));
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error [validation_error]"), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serve_answers_every_request_until_eof() -> Result<()> {
    let server = Arc::new(server(ResponseFormat::Json));
    let input = [
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" }),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "image_preprocess", "arguments": { "image_data": png_base64(40, 20) } }
        }),
    ]
    .iter()
    .map(|frame| format!("{frame}\n"))
    .collect::<String>();

    let (writer, mut output) = tokio::io::duplex(1 << 20);
    let serving = tokio::spawn(Arc::clone(&server).serve(std::io::Cursor::new(input.into_bytes()), writer));

    let mut raw = String::new();
    output.read_to_string(&mut raw).await?;
    serving.await??;

    let replies: HashMap<u64, Value> = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .map(|reply| (reply["id"].as_u64().unwrap(), reply))
        .collect();
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[&3]["result"], json!({}));
    assert_eq!(replies[&4]["result"]["isError"], json!(false));
    Ok(())
}
