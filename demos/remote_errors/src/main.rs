//! Cross-boundary error marshaling: a failing remote handler surfaces
//! locally as a RemoteError with a stack spanning both sides.

use muxchan::{transport, Channel, ChannelOptions, Error, Rejection, Value, WireError};
use serde_json::json;

#[tokio::main]
async fn main() -> muxchan::Result<()> {
    tracing_subscriber::fmt::init();

    let (client_end, server_end) = transport::pair();
    let client = Channel::with_options(
        client_end,
        ChannelOptions {
            print_remote_rejections: true,
            ..ChannelOptions::default()
        },
    );
    let server = Channel::new(server_end);

    server.on_request("volatile", |_params: Value| async move {
        Err::<Value, Rejection>(Rejection::Error(WireError::new("disk on fire")))
    });

    client.set_remote_error_hook(|err| async move {
        tracing::warn!(%err, "remote failure observed by hook");
        err
    });

    match client.send_request("volatile", json!({})).await {
        Err(Error::Remote(remote)) => {
            tracing::error!(name = %remote.name, message = %remote.message, "request failed remotely");
        }
        other => tracing::info!(?other, "unexpected outcome"),
    }

    Ok(())
}
