//! Route configuration shared by the main server and test servers.

use actix_web::web;

use crate::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/ask", web::post().to(handlers::ask_question))
        .route("/health", web::get().to(handlers::health_check))
        .route("/datasets", web::get().to(handlers::list_datasets));
}
