//! Request/response and pub/sub over one in-memory transport pair

use muxchan::{transport, Channel, Rejection, Result, Value};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let (client_end, server_end) = transport::pair();
    let client = Channel::new(client_end);
    let server = Channel::new(server_end);

    server.on_request("math.add", |params: Value| async move {
        let a = params["a"].as_i64().unwrap_or(0);
        let b = params["b"].as_i64().unwrap_or(0);
        Ok::<_, Rejection>(a + b)
    });

    server.on_event("greeting", |data: Value| async move {
        tracing::info!(%data, "greeting received");
        Ok(())
    });

    let sum = client.send_request("math.add", json!({"a": 10, "b": 5})).await?;
    tracing::info!(%sum, "10 + 5");

    client.send_event("greeting", json!({"from": "client"})).await?;

    // Scoped sub-channels share the transport without name collisions.
    let editor = server.scope("editor");
    editor.on_request("save", |_params: Value| async move {
        Ok::<_, Rejection>(json!({"saved": true}))
    });
    let saved = client.scope("editor").send_request("save", json!({})).await?;
    tracing::info!(%saved, "scoped request");

    Ok(())
}
