use looplite::{Handler, Response, Result, Router, Server, ServerConfig, StatusCode};
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "looplite=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Failed to start server");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let server = Server::new(config, routes()?);
    server.listen().await
}

fn routes() -> Result<Router> {
    let mut router = Router::new();

    router
        .get(
            "/",
            Handler::new(Vec::<String>::new(), |_args| async move {
                Ok(json!({"message": "Welcome to looplite!"}))
            }),
        )?
        .get(
            "/status",
            Handler::new(Vec::<String>::new(), |_args| async move {
                Ok(json!({
                    "status": "ok",
                    "server_time": chrono::Utc::now().to_rfc3339(),
                }))
            }),
        )?
        .get(
            "/users/<id>",
            Handler::new(["id", "request"], |args| async move {
                Ok(json!({
                    "id": args.str("id")?,
                    "host": args.request()?.header("Host"),
                }))
            }),
        )?
        .post(
            "/items",
            Handler::new(["name"], |args| async move {
                let name: String = args.deserialize("name")?;
                Ok(Response::from_json(StatusCode::CREATED, json!({"name": name})))
            }),
        )?
        .get(
            "/download",
            Handler::new(Vec::<String>::new(), |_args| async move {
                Ok(Response::text(StatusCode::OK, "File content")
                    .with_header("Content-Disposition", "attachment; filename=\"file.txt\""))
            }),
        )?;

    Ok(router)
}
