//! HTTP routes

pub mod health;
pub mod images;

use actix_web::web;

/// Register every route. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::status))
        .service(web::resource("/images").route(web::post().to(images::upload_image)))
        .service(
            web::resource("/images/{filename}")
                .route(web::get().to(images::get_image))
                .route(web::put().to(images::update_image))
                .route(web::delete().to(images::delete_image)),
        );
}
