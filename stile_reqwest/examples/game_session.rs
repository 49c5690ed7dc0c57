use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use stile_reqwest::{AccessTokenMiddleware, RefreshCoordinator, TokenRefreshMiddleware};
use stile_tokens::bootstrap::SessionBootstrap;
use stile_tokens::sources::TmaTokenSource;
use stile_tokens::store::FileTokenStore;
use stile_tokens::{InitData, TokenStore};

#[derive(Debug, Parser)]
struct Opts {
    /// The base URL of the game API
    #[arg(short, long, env)]
    api_url: reqwest::Url,

    /// The endpoint exchanging platform init data for session tokens
    #[arg(long, env)]
    sync_url: reqwest::Url,

    /// The endpoint exchanging a refresh token for a new access token
    #[arg(long, env)]
    refresh_url: reqwest::Url,

    /// The signed init data blob provided by the embedding platform
    #[arg(short, long, env, hide_env_values = true)]
    init_data: Option<InitData>,

    /// The local file used to persist the session between runs
    #[arg(short = 'f', long, env, value_name = "FILE", default_value = ".session.json")]
    session_file: std::path::PathBuf,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameStarted {
    session_id: String,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let store = Arc::new(FileTokenStore::new(opts.session_file));

    // The auth exchanges use a plain client so they never re-enter the
    // middleware stack below.
    let source = TmaTokenSource::new(Client::new(), opts.sync_url, opts.refresh_url);

    let bootstrap = SessionBootstrap::new(store.clone(), source.clone());
    if store.current().await?.is_none() {
        let user = bootstrap.establish(opts.init_data.as_deref()).await?;
        tracing::info!(
            user.id = user.id,
            user.coins = user.coins,
            "session established"
        );
    }

    let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), source));
    let mut resets = coordinator.resets();

    let client = ClientBuilder::new(Client::default())
        .with(TokenRefreshMiddleware::new(coordinator.clone()))
        .with(AccessTokenMiddleware::new(store))
        .build();

    let game: GameStarted = client
        .post(opts.api_url.join("game/start")?)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    tracing::info!(session_id = %game.session_id, "game started");

    // Pretend to play for a bit. Any 401 along the way is absorbed by the
    // refresh middleware; the caller only sees the final outcome.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let score = 1234;
    client
        .post(opts.api_url.join("game/end")?)
        .json(&serde_json::json!({ "sessionId": game.session_id, "score": score }))
        .send()
        .await?
        .error_for_status()?;
    tracing::info!(score, "game finished");

    if resets.has_changed()? {
        tracing::warn!("session was terminated mid-run, re-run with fresh init data");
    }

    Ok(())
}
