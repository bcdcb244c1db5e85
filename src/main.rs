/// Group gate server binary
use group_gate::{config::ServerConfig, context::AppContext, error::GateResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> GateResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Create application context
    let ctx = AppContext::new(config)?;

    // Start server (and background jobs)
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ____                         ____       _
  / ___|_ __ ___  _   _ _ __   / ___| __ _| |_ ___
 | |  _| '__/ _ \| | | | '_ \ | |  _ / _` | __/ _ \
 | |_| | | | (_) | |_| | |_) || |_| | (_| | ||  __/
  \____|_|  \___/ \__,_| .__/  \____|\__,_|\__\___|
                       |_|
        Identity-verified group QR gateway v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
