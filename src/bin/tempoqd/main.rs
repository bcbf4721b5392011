use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use tempoq::config::Config;
use tempoq::engine::{pumper, Engine};
use tempoq::http;
use tempoq::store::{MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if config.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .init();
    } else {
        tracing_subscriber::fmt().json().init();
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange with ctrl-c handling!");
            }
            cancel.cancel();
        });
    }

    if config.redis_url.is_empty() {
        info!("no redis_url configured, using the in-memory store");
        run(MemoryStore::new(), config, cancel).await
    } else {
        match RedisStore::connect(config.redis_url.as_str()).await {
            Ok(store) => run(store, config, cancel).await,
            Err(error) => {
                error!(%error, "failed to connect to the backing store");
                ExitCode::from(111)
            },
        }
    }
}

async fn run<S: tempoq::store::Store>(store: S, config: Config, cancel: CancellationToken) -> ExitCode {
    let store = Arc::new(store);
    let engine = Engine::new(Arc::clone(&store));

    let pumper_handle = pumper::spawn(store, config.pump_interval_ms, cancel.clone());

    let router = http::router(
        engine,
        config.default_ttl_s,
        config.default_tries,
        config.max_body_bytes,
    );

    let listener = match tokio::net::TcpListener::bind((config.listen, config.port)).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%error, "failed to listen for connections");
            cancel.cancel();
            let _ = pumper_handle.await;
            return ExitCode::from(111);
        },
    };

    info!(addr = %listener.local_addr().unwrap(), "listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    cancel.cancel();
    let _ = pumper_handle.await;

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "encountered runtime error");
            ExitCode::FAILURE
        },
    }
}
