use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::{Arg, Command};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fhirlens_server::clients::{BigQueryWarehouse, VertexTextModel};
use fhirlens_server::config::AppConfig;
use fhirlens_server::error::AppResult;
use fhirlens_server::handlers::AppState;
use fhirlens_server::pipeline::QueryProcessor;
use fhirlens_server::routes::configure_routes;
use fhirlens_server::schema::SchemaContext;

#[actix_web::main]
async fn main() -> AppResult<()> {
    let matches = Command::new("fhirlens-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Natural-language analytics service for FHIR Synthea on BigQuery")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to configuration file")
                .value_name("FILE"),
        )
        .get_matches();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env().add_directive("fhirlens_server=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting fhirlens server");

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let (config, config_file) = AppConfig::load(config_path.as_deref())?;
    config.validate()?;
    tracing::info!("Loaded configuration from {}", config_file.display());

    let config = Arc::new(config);
    let schema = Arc::new(SchemaContext::fhir_synthea(&config.gcp.dataset));
    tracing::info!(
        "Serving dataset {} with {} tables",
        schema.dataset,
        schema.tables.len()
    );

    let model = Arc::new(VertexTextModel::from_config(&config)?);
    let warehouse = Arc::new(BigQueryWarehouse::from_config(&config)?);
    let processor = Arc::new(QueryProcessor::new(
        model,
        warehouse.clone(),
        schema.clone(),
        config.clone(),
    ));

    let app_state = web::Data::new(AppState {
        config: config.clone(),
        schema,
        processor,
        warehouse,
        start_time: SystemTime::now(),
    });

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting HTTP server on {}", server_addr);

    let allowed_origins = config
        .cors
        .as_ref()
        .map(|cors| cors.allowed_origins.clone())
        .unwrap_or_default();

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(build_cors(&allowed_origins))
            .configure(configure_routes)
    })
    .bind(&server_addr)?
    .run()
    .await?;

    Ok(())
}

fn build_cors(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|origin| origin == "*") {
        return Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
    }

    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}
