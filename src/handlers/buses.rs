use actix_web::{web, HttpResponse};

use super::CurrentStudent;
use crate::error::ServiceError;
use crate::services::BookingService;
use crate::state::AppState;

pub async fn list_buses(
    state: web::Data<AppState>,
    _student: CurrentStudent,
) -> Result<HttpResponse, ServiceError> {
    let buses = BookingService::new(&state).list_buses().await?;
    Ok(HttpResponse::Ok().json(buses))
}
