use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::CurrentStudent;
use crate::error::ServiceError;
use crate::models::ReportQuery;
use crate::services::admin::{self, ManifestKind};
use crate::state::AppState;

fn require_staff(student: &CurrentStudent) -> Result<(), ServiceError> {
    if student.0.is_staff {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

pub async fn pickup_list(
    state: web::Data<AppState>,
    student: CurrentStudent,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ServiceError> {
    require_staff(&student)?;
    let lists = admin::manifests(state.store.as_ref(), &query, ManifestKind::Pickup).await?;
    Ok(HttpResponse::Ok().json(lists))
}

pub async fn dropoff_list(
    state: web::Data<AppState>,
    student: CurrentStudent,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ServiceError> {
    require_staff(&student)?;
    let lists = admin::manifests(state.store.as_ref(), &query, ManifestKind::Dropoff).await?;
    Ok(HttpResponse::Ok().json(lists))
}

pub async fn stats(
    state: web::Data<AppState>,
    student: CurrentStudent,
) -> Result<HttpResponse, ServiceError> {
    require_staff(&student)?;
    let stats = admin::quick_stats(state.store.as_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(stats))
}
