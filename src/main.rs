use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use anonboard::openapi::ApiDoc;
use anonboard::repo::Repo;
use anonboard::routes::{self, config, AppState};
use anonboard::{SecurityHeaders, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env is a development convenience; deployments set the environment directly.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Settings::from_env();
    settings.validate().map_err(anyhow::Error::msg)?;
    info!("Bootstrapping message board server");
    info!("CORS origin: {}", settings.frontend_url.as_deref().unwrap_or("*"));

    let repo = build_repo(&settings).await?;
    let state = AppState::new(repo);
    let openapi = ApiDoc::openapi();
    let hsts = settings.enable_hsts;
    let frontend_url = settings.frontend_url.clone();

    let server = HttpServer::new(move || {
        let cors = match &frontend_url {
            Some(origin) => Cors::default().allowed_origin(origin),
            None => Cors::default().allow_any_origin(),
        }
        .allow_any_header()
        .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::default().with_hsts(hsts))
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .default_service(web::route().to(routes::not_found))
    })
    .bind((settings.host.as_str(), settings.port))
    .with_context(|| format!("binding {}:{}", settings.host, settings.port))?;

    info!("Listening on http://{}:{}", settings.host, settings.port);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use anonboard::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let url = settings.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await
        .context("connecting to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use anonboard::repo::inmem::InMemRepo;

    info!("Using in-memory repository backend (snapshots in {})", settings.data_dir.display());
    Ok(Arc::new(InMemRepo::with_data_dir(&settings.data_dir)))
}

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable the `inmem-store` or `postgres-store` feature");
