use oauth1_identify::{
    Client, ClientConfig, Consumer, http::reqwest_client, secrecy::ExposeSecret as _,
};
use snafu::prelude::*;
use tracing_subscriber::EnvFilter;

#[snafu::report]
#[tokio::main]
pub async fn main() -> Result<(), snafu::Whatever> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint =
        std::env::var("OAUTH_ENDPOINT").whatever_context("Failed to get OAUTH_ENDPOINT")?;
    let consumer_key =
        std::env::var("CONSUMER_KEY").whatever_context("Failed to get CONSUMER_KEY")?;
    let consumer_secret =
        std::env::var("CONSUMER_SECRET").whatever_context("Failed to get CONSUMER_SECRET")?;

    let config = ClientConfig::builder(endpoint)
        .consumer(Consumer::new(consumer_key, consumer_secret))
        .user_agent(concat!("oauth1-identify-demo/", env!("CARGO_PKG_VERSION")))
        .build()
        .whatever_context("Invalid client configuration")?;
    let http_client = reqwest_client(&config).whatever_context("Failed to build HTTP client")?;
    let client = Client::new(config, http_client);

    let (authorization_url, request_token) = client
        .initiate()
        .await
        .whatever_context("Getting request token failed")?;

    println!("Authorization URL: {authorization_url}");
    println!("Paste the verification code:");

    let mut verifier = String::new();
    std::io::stdin()
        .read_line(&mut verifier)
        .whatever_context("Failed to read verifier")?;

    let access_token = client
        .complete(&request_token, verifier.trim())
        .await
        .whatever_context("Getting access token failed")?;

    println!("Access token: {}", access_token.key());
    println!("Access secret: {}", access_token.secret().expose_secret());

    let identity = client
        .identify(&access_token)
        .await
        .whatever_context("Identifying the user failed")?;

    println!(
        "Authenticated as {} (groups: {})",
        identity.username.as_deref().unwrap_or(&identity.sub),
        identity.groups.join(", ")
    );

    Ok(())
}
