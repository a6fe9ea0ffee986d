use oauth1_identify::{Client, ClientConfig, Consumer, OAuthCall, Token, http::reqwest_client};
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
    let api_url = std::env::var("API_URL").whatever_context("Failed to get API_URL")?;
    let consumer_key =
        std::env::var("CONSUMER_KEY").whatever_context("Failed to get CONSUMER_KEY")?;
    let consumer_secret =
        std::env::var("CONSUMER_SECRET").whatever_context("Failed to get CONSUMER_SECRET")?;
    let access_key = std::env::var("ACCESS_KEY").whatever_context("Failed to get ACCESS_KEY")?;
    let access_secret =
        std::env::var("ACCESS_SECRET").whatever_context("Failed to get ACCESS_SECRET")?;

    let config = ClientConfig::builder(endpoint)
        .consumer(Consumer::new(consumer_key, consumer_secret))
        .build()
        .whatever_context("Invalid client configuration")?;
    let http_client = reqwest_client(&config).whatever_context("Failed to build HTTP client")?;
    let client = Client::new(config, http_client);
    let access_token = Token::new(access_key, access_secret);

    let user_info = client
        .make_oauth_call(
            Some(&access_token),
            &api_url,
            OAuthCall::builder()
                .params(
                    [("action", "query"), ("meta", "userinfo"), ("format", "json")]
                        .into_iter()
                        .collect(),
                )
                .build(),
        )
        .await
        .whatever_context("User info call failed")?;
    println!("User info: {}", String::from_utf8_lossy(&user_info));

    let csrf = client
        .make_oauth_call(
            Some(&access_token),
            &api_url,
            OAuthCall::builder()
                .is_post(true)
                .params(
                    [("action", "query"), ("meta", "tokens"), ("format", "json")]
                        .into_iter()
                        .collect(),
                )
                .build(),
        )
        .await
        .whatever_context("Token call failed")?;
    println!("Tokens: {}", String::from_utf8_lossy(&csrf));

    Ok(())
}
