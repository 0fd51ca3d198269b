use std::io;

use tradeunifox::{Credential, Gateway};

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

    let mut credential = Credential::new(
        required("TRADEUNIFOX_USERNAME")?,
        required("TRADEUNIFOX_API_KEY")?,
    )?;
    if let Ok(password) = std::env::var("TRADEUNIFOX_PASSWORD") {
        credential = credential.with_password(password)?;
    }

    let mut builder = Gateway::builder();
    if let Ok(base_url) = std::env::var("TRADEUNIFOX_BASE_URL") {
        builder = builder.base_url(base_url);
    }
    let manager = builder.build()?.token_manager(credential);

    let status = manager.check_token_status().await?;
    println!(
        "gateway holds a token: {}, expires at: {:?}",
        status.has_token, status.expires_at
    );

    let info = manager.current_or_new_token().await?;
    println!(
        "token: {}, new: {}, expires at: {:?}",
        info.token.as_str(),
        info.is_new,
        info.expires_at
    );

    Ok(())
}
