//! Lens server binary: config + logging bootstrap, then the TCP
//! transport over a server core.

use std::net::SocketAddr;

use clap::Parser;
use lens_config::{CliArgs, Config, default_config_dir};
use lens_engine::{OperationDef, OperationRegistry};
use lens_resolve::SchemaRegistry;
use lens_server::{
    FrameConfig, LensServer, TcpTransport, TransportConfig, resolve_config_from, state_policy_from,
};
use lens_value::json;
use lens_wire::PROTOCOL_VERSION;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);

    lens_log::init_logging(None, Some(&config));

    let mut operations = OperationRegistry::new();
    operations.register(OperationDef::query("server.info", |_input, _ctx| async {
        Ok(json!({
            "name": "lens-server",
            "protocol": PROTOCOL_VERSION,
        }))
    }));

    let server = LensServer::new(
        operations,
        SchemaRegistry::new(),
        state_policy_from(&config),
        resolve_config_from(&config),
    );

    let bind_addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.port).parse()?;
    let transport = TcpTransport::new(
        server,
        TransportConfig {
            bind_addr,
            max_connections: config.server.max_connections,
            frame: FrameConfig {
                max_payload_size: config.server.max_frame_size,
            },
        },
    );

    tracing::info!(addr = %bind_addr, "lens server starting");
    transport.serve().await?;
    Ok(())
}
