//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the trigger API.
pub async fn cmd_serve(settings: &Settings, bind: &str, watch: bool) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;

    println!(
        "{} Starting blobflow at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    if watch {
        println!(
            "  Watching {}",
            style(
                settings
                    .storage
                    .local_root
                    .join(&settings.storage.source_container)
                    .display()
            )
            .dim()
        );
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port, watch).await
}

/// Parse a bind address that can be:
/// - Just a port: "7071" -> 127.0.0.1:7071
/// - Just a host: "0.0.0.0" -> 0.0.0.0:7071
/// - Host and port: "0.0.0.0:7071" -> 0.0.0.0:7071
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
        anyhow::bail!("Invalid port in bind address: {}", bind);
    }

    Ok((bind.to_string(), 7071))
}
