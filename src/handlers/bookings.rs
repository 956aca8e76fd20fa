use actix_web::{web, HttpResponse};
use chrono::{Local, Utc};
use log::debug;

use super::CurrentStudent;
use crate::error::ServiceError;
use crate::models::{CreateBookingRequest, ResendOtpRequest, VerifyOtpRequest};
use crate::services::BookingService;
use crate::state::AppState;

pub async fn create_booking(
    state: web::Data<AppState>,
    student: CurrentStudent,
    booking_req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Booking request from {}: {:?}", student.0.email, booking_req);
    let response = BookingService::new(&state)
        .create(
            &student.0,
            booking_req.into_inner(),
            Local::now().date_naive(),
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn current_booking(
    state: web::Data<AppState>,
    student: CurrentStudent,
) -> Result<HttpResponse, ServiceError> {
    let response = BookingService::new(&state).current(&student.0).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn cancel_booking(
    state: web::Data<AppState>,
    student: CurrentStudent,
) -> Result<HttpResponse, ServiceError> {
    let response = BookingService::new(&state).cancel(&student.0).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn verify_otp(
    state: web::Data<AppState>,
    student: CurrentStudent,
    body: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse, ServiceError> {
    let response = BookingService::new(&state)
        .verify_otp(&student.0, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn resend_otp(
    state: web::Data<AppState>,
    student: CurrentStudent,
    body: web::Json<ResendOtpRequest>,
) -> Result<HttpResponse, ServiceError> {
    let response = BookingService::new(&state)
        .resend_otp(&student.0, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}
