use tokio::net::TcpListener;

use talenttrade::config::Config;
use talenttrade::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talenttrade=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = talenttrade::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let state = AppState::new(db, config.auth_timeout);

    // Expired tokens can never authenticate again; drop them periodically
    let reaper_db = state.db.clone();
    let reap_interval = config.token_reap_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_interval);
        loop {
            interval.tick().await;
            match talenttrade::db::tokens::purge_expired(&reaper_db).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("purged {n} expired token(s)"),
                Err(e) => tracing::error!("token reaper error: {:?}", e),
            }
        }
    });

    let app = talenttrade::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let auth_timeout = match config.auth_timeout {
        Some(limit) => format!("{}s", limit.as_secs()),
        None => "none".to_string(),
    };

    eprintln!();
    eprintln!("  \x1b[1;36mtalenttrade\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mauth timeout\x1b[0m {auth_timeout}");
    eprintln!();
}
