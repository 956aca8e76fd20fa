pub mod admin;
pub mod auth;
pub mod bookings;
pub mod buses;

use actix_web::{error::InternalError, web, HttpResponse};
use serde_json::json;

pub use auth::CurrentStudent;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = json!({ "detail": format!("JSON parse error - {}", err) });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// Routing table for the `/api` surface.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            .route("/login/", web::post().to(auth::login))
            .route("/logout/", web::post().to(auth::logout))
            .route("/user/", web::get().to(auth::current_user))
            .route("/buses/", web::get().to(buses::list_buses))
            .route("/bookings/", web::post().to(bookings::create_booking))
            .route("/bookings/current/", web::get().to(bookings::current_booking))
            .route("/bookings/cancel/", web::delete().to(bookings::cancel_booking))
            .route("/bookings/verify-otp/", web::post().to(bookings::verify_otp))
            .route("/bookings/resend-otp/", web::post().to(bookings::resend_otp))
            .route("/admin/pickup-list/", web::get().to(admin::pickup_list))
            .route("/admin/dropoff-list/", web::get().to(admin::dropoff_list))
            .route("/admin/stats/", web::get().to(admin::stats)),
    );
}
