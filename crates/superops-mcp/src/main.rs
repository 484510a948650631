//! SuperOps MCP Gateway - Entry Point
//!
//! Runs the MCP server over stdio for integration with MCP clients.

use anyhow::Result;
use argh::FromArgs;
use superops_mcp::{ClientProvider, Credentials, GatewayServer, Region};

/// SuperOps MCP Gateway - Expose SuperOps PSA/RMM to AI assistants
#[derive(FromArgs)]
struct Args {
    /// data region, "us" or "eu" (overrides SUPEROPS_REGION)
    #[argh(option)]
    region: Option<Region>,

    /// graphql endpoint URL (overrides SUPEROPS_API_URL and the region default)
    #[argh(option)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    // Initialize logging to stderr (stdout is used for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting SuperOps MCP gateway v{}", superops_mcp::server::SERVER_VERSION);

    let Args { region, endpoint } = args;
    let provider = ClientProvider::new(move || {
        let mut credentials = Credentials::from_env()?;
        if let Some(region) = region {
            credentials = credentials.with_region(region);
        }
        if let Some(endpoint) = &endpoint {
            credentials = credentials.with_endpoint(endpoint.clone());
        }
        Ok(credentials)
    });

    match provider.credentials() {
        Ok(credentials) => log::info!(
            "Using subdomain '{}' at {}",
            credentials.subdomain,
            credentials.endpoint()
        ),
        Err(e) => log::warn!("{} Domain tools will fail until this is fixed.", e),
    }

    let server = GatewayServer::with_provider(provider);
    server.run_stdio().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, argh::EarlyExit> {
        Args::from_args(&["superops-mcp"], args)
    }

    #[test]
    fn overrides_are_optional() {
        let args = parse(&[]).unwrap();
        assert!(args.region.is_none());
        assert!(args.endpoint.is_none());
    }

    #[test]
    fn parses_region_and_endpoint() {
        let args = parse(&["--region", "eu", "--endpoint", "http://localhost:4000/graphql"]).unwrap();
        assert_eq!(args.region, Some(Region::Eu));
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:4000/graphql"));
    }

    #[test]
    fn rejects_unknown_region() {
        assert!(parse(&["--region", "apac"]).is_err());
    }

    #[test]
    fn help_describes_options() {
        let help = parse(&["--help"]).err().unwrap().output;
        assert!(help.contains("--endpoint"));
        assert!(help.contains("graphql endpoint URL"));
    }
}
