// Route exports
pub mod predict;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Path the platform backend has always called
        .route("/predict/", web::post().to(predict::predict))
        .service(
            web::scope("/api/v1")
                .configure(predict::configure),
        );
}
