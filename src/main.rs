use color_eyre::eyre::{Result, WrapErr, eyre};
use echobin::{HttpConfig, HttpServer, ServerTrait};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("echobin=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("echobin");

    let mut config = HttpConfig::from_env().wrap_err("Invalid ECHOBIN_* environment")?;

    match args.get(1).map(String::as_str) {
        None => {}
        Some("-h" | "--help") => {
            print_usage(program);
            return Ok(());
        }
        Some(port) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| eyre!("Invalid port {port:?}: {e}"))?;
            config.bind_addr.set_port(port);
        }
    }

    config.validate().wrap_err("Invalid server configuration")?;

    info!(
        address = %config.bind_addr,
        max_connections = config.max_connections,
        max_delay_secs = config.max_delay.as_secs_f64(),
        request_timeout_secs = config.request_timeout.as_secs_f64(),
        "Starting HTTP diagnostics server"
    );

    let server = HttpServer::new(config);
    server.run().await.wrap_err("Failed to run HTTP server")?;

    Ok(())
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [port]");
    eprintln!("  port: Port to listen on (default: 8080, or ECHOBIN_PORT)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ECHOBIN_BIND             Socket address to bind (default: 0.0.0.0:8080)");
    eprintln!("  ECHOBIN_PORT             Port on the default bind host");
    eprintln!("  ECHOBIN_MAX_DELAY        Ceiling for /delay/{{seconds}} in seconds (default: 10)");
    eprintln!("  ECHOBIN_REQUEST_TIMEOUT  Limit on handling one request in seconds (default: 30)");
    eprintln!("  ECHOBIN_MAX_CONNECTIONS  Concurrent connection limit (default: 1000)");
    eprintln!("  RUST_LOG                 Log filter (default: echobin=info)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {program}                        # Listen on 0.0.0.0:8080");
    eprintln!("  {program} 9090                   # Listen on 0.0.0.0:9090");
    eprintln!("  ECHOBIN_MAX_DELAY=3 {program}    # Clamp delays to 3 seconds");
}
