//! Small JSON service exercising the request helpers.
//!
//! ```text
//! LISTEN_ADDR=127.0.0.1:8080 cargo run --example echo
//! curl -s localhost:8080/items?limit=2
//! curl -s -d '{"name":"kettle","qty":3}' localhost:8080/items
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;

use http::{Method, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use httputil::config::{env_or, ProcessEnv};
use httputil::{Config, HandlerService, RequestContext};

#[derive(Debug, Serialize, Deserialize)]
struct Item {
    name: String,
    qty: u32,
}

#[derive(Debug)]
struct ItemStoreError(String);

impl std::fmt::Display for ItemStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ItemStoreError {}

fn store(item: &Item) -> Result<BTreeMap<&'static str, String>, ItemStoreError> {
    if item.qty == 0 {
        return Err(ItemStoreError("quantity must be positive".into()));
    }
    Ok(BTreeMap::from([("stored", item.name.clone())]))
}

fn route(ctx: &mut RequestContext<'_>) {
    let method = ctx.request().method().clone();
    let path = ctx.request().path().to_string();

    match (method, path.as_str()) {
        (Method::GET, "/items") => list_items(ctx),
        (Method::POST, "/items") => {
            let _ = create_item(ctx);
        }
        _ => {
            ctx.error("not found", StatusCode::NOT_FOUND);
        }
    }
}

fn list_items(ctx: &mut RequestContext<'_>) {
    let mut limit: i64 = 10;
    let mut verbose = false;
    if ctx.decode_form("limit", &mut limit).is_err()
        || ctx.decode_form("verbose", &mut verbose).is_err()
    {
        return;
    }

    let items: Vec<Item> = (0..limit.clamp(0, 100))
        .map(|i| Item {
            name: format!("item-{}", i),
            qty: i as u32,
        })
        .collect();
    if verbose {
        info!(request_id = %ctx.context().request_id, count = items.len(), "listing items");
    }
    ctx.encode(&items);
}

fn create_item(ctx: &mut RequestContext<'_>) -> httputil::core::Result<()> {
    let item: Item = ctx.decode()?;
    let stored = ctx.check("storing item", store(&item))?;
    ctx.encode_with_status(StatusCode::CREATED, &stored);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    httputil::logging::init(&config.logging)?;
    config.log_summary();

    let addr: SocketAddr = env_or(&ProcessEnv, "LISTEN_ADDR", "127.0.0.1:8080").parse()?;
    let listener = TcpListener::bind(addr).await?;
    let shutdown = CancellationToken::new();
    let service = HandlerService::new(route, config.service).with_shutdown(shutdown.clone());

    info!("Listening on http://{}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let _ = stream.set_nodelay(true);
                let service = service.clone();

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(error = %e, "connection error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                shutdown.cancel();
                break;
            }
        }
    }

    Ok(())
}
