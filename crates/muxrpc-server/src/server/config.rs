use anyhow::bail;
use clap::Parser;
use std::net::SocketAddr;

/// Runtime configuration for the `muxrpc-server` binary.
///
/// These settings control where the shared listener binds, how the serving
/// process identifies itself to RPC clients, and how much buffering sits
/// between the demultiplexer and the gRPC engine. All values are parsed from
/// CLI arguments or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "muxrpc-server",
    version,
    about = "A tag byte demultiplexer serving gRPC on a shared listener"
)]
pub struct CliArgs {
    /// Address of the shared listener.
    ///
    /// Every accepted connection must start with a one-byte tag. Use port `0`
    /// to let the OS pick a free port.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("127.0.0.1:8300"))]
    pub server_addr: String,

    /// Name reported by the `Something` call.
    ///
    /// Environment variable: `SERVER_NAME`
    #[arg(long, env = "SERVER_NAME", default_value_t = String::from("muxrpc"))]
    pub server_name: String,

    /// Datacenter reported by every response.
    ///
    /// Environment variable: `DATACENTER`
    #[arg(long, env = "DATACENTER", default_value_t = String::from("dc1"))]
    pub datacenter: String,

    /// Capacity of the hand-off queue between the demultiplexer and the gRPC
    /// engine.
    ///
    /// Classification tasks wait when the engine falls this many connections
    /// behind.
    ///
    /// Environment variable: `HANDOFF_BUFFER_SIZE`
    #[arg(long, env = "HANDOFF_BUFFER_SIZE", default_value_t = 64)]
    pub handoff_buffer_size: usize,

    /// Capacity of the per-call response buffer used by `Flow`.
    ///
    /// Environment variable: `FLOW_BUFFER_SIZE`
    #[arg(long, env = "FLOW_BUFFER_SIZE", default_value_t = 2)]
    pub flow_buffer_size: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub server_name: String,
    pub datacenter: String,
    pub handoff_buffer_size: usize,
    pub flow_buffer_size: usize,
}

impl ServerConfig {
    /// Configuration for an embedded server on an ephemeral loopback port.
    pub fn new(server_name: impl Into<String>, datacenter: impl Into<String>) -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            server_name: server_name.into(),
            datacenter: datacenter.into(),
            handoff_buffer_size: 64,
            flow_buffer_size: 2,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.server_name.trim().is_empty() {
            bail!("SERVER_NAME must not be empty");
        }

        if args.datacenter.trim().is_empty() {
            bail!("DATACENTER must not be empty");
        }

        if args.handoff_buffer_size == 0 {
            bail!("HANDOFF_BUFFER_SIZE must be greater than 0");
        }

        if args.flow_buffer_size == 0 {
            bail!("FLOW_BUFFER_SIZE must be greater than 0");
        }

        let server_addr = args.server_addr.parse::<SocketAddr>().map_err(|e| {
            anyhow::anyhow!("SERVER_ADDR ({}) is not a socket address: {e}", args.server_addr)
        })?;

        Ok(Self {
            server_addr,
            server_name: args.server_name,
            datacenter: args.datacenter,
            handoff_buffer_size: args.handoff_buffer_size,
            flow_buffer_size: args.flow_buffer_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["muxrpc-server"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_explicit_arguments() {
        let config = ServerConfig::try_from(args(&[
            "--server-addr",
            "0.0.0.0:9000",
            "--server-name",
            "one-server",
            "--datacenter",
            "dc2",
            "--handoff-buffer-size",
            "8",
        ]))
        .unwrap();

        assert_eq!(config.server_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.server_name, "one-server");
        assert_eq!(config.datacenter, "dc2");
        assert_eq!(config.handoff_buffer_size, 8);
    }

    #[test]
    fn rejects_zero_handoff_buffer() {
        let err = ServerConfig::try_from(args(&["--handoff-buffer-size", "0"])).unwrap_err();
        assert!(err.to_string().contains("HANDOFF_BUFFER_SIZE"));
    }

    #[test]
    fn rejects_zero_flow_buffer() {
        let err = ServerConfig::try_from(args(&["--flow-buffer-size", "0"])).unwrap_err();
        assert!(err.to_string().contains("FLOW_BUFFER_SIZE"));
    }

    #[test]
    fn rejects_blank_datacenter() {
        let err = ServerConfig::try_from(args(&["--datacenter", " "])).unwrap_err();
        assert!(err.to_string().contains("DATACENTER"));
    }

    #[test]
    fn rejects_unparseable_address() {
        let err = ServerConfig::try_from(args(&["--server-addr", "localhost"])).unwrap_err();
        assert!(err.to_string().contains("SERVER_ADDR"));
    }

    #[test]
    fn embedded_config_uses_an_ephemeral_port() {
        let config = ServerConfig::new("one-server", "dc1");
        assert_eq!(config.server_addr.port(), 0);
        assert!(config.server_addr.ip().is_loopback());
    }
}
