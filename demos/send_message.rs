use std::io;

use tradeunifox::{Credential, Gateway, TradeUnifoxError};

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
    let recipient = required("TRADEUNIFOX_TO")?;
    let message = std::env::var("TRADEUNIFOX_MESSAGE")
        .unwrap_or_else(|_| "Hello from the tradeunifox demo.".to_owned());

    let gateway = Gateway::new();
    let manager = gateway.token_manager(credential.clone());
    let token = match std::env::var("TRADEUNIFOX_TOKEN") {
        Ok(token) => tradeunifox::Token::new(token)?,
        Err(_) => manager.refresh_token().await?,
    };

    let sender = gateway.sender(credential.session(token));
    let receipt = match sender.send_message(recipient.as_str(), message.as_str()).await {
        Err(err @ TradeUnifoxError::Auth { .. }) => {
            tracing::warn!(error = %err, "token rejected, refreshing once");
            let sender = gateway.sender(credential.session(manager.refresh_token().await?));
            sender.send_message(recipient, message).await?
        }
        other => other?,
    };

    println!(
        "status: {:?}, message_id: {:?}",
        receipt.status, receipt.message_id
    );
    Ok(())
}
