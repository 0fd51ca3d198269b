use std::io;
use std::time::Duration;

use tradeunifox::{Credential, Gateway, InboundMessage, PollLimit};

fn required(name: &str) -> Result<String, io::Error> {
    std::env::var(name).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{name} environment variable is required"),
        )
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tradeunifox=info")),
        )
        .init();

    let credential = Credential::new(
        required("TRADEUNIFOX_USERNAME")?,
        required("TRADEUNIFOX_API_KEY")?,
    )?;

    let gateway = Gateway::new();
    let token = gateway
        .token_manager(credential.clone())
        .refresh_token()
        .await?;

    let mut receiver = gateway
        .receiver(credential.session(token))
        .with_interval(Duration::from_secs(3))
        .with_limit(PollLimit::new(20)?)
        .with_mark_as_read(true);

    let report = receiver.check_connection().await?;
    println!(
        "{} answered HTTP {}: {}",
        report.base_url, report.status, report.body_preview
    );
    println!("unread: {}", receiver.unread_count().await?);

    receiver.on_message(|message: InboundMessage| {
        println!(
            "[{}] {}: {}",
            message.timestamp.as_deref().unwrap_or("-"),
            message.sender.as_deref().unwrap_or("unknown"),
            message.body
        );
    });

    let stop = receiver.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    println!("polling, press Ctrl-C to stop");
    receiver.start().await?;
    Ok(())
}
