use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest, HttpResponse};
use futures::future::LocalBoxFuture;
use log::{debug, info};

use crate::error::ServiceError;
use crate::models::{ActionResponse, LoginRequest, Student, StudentResponse};
use crate::services::auth as auth_service;
use crate::state::AppState;

/// The student named by the request's Basic credentials.
pub struct CurrentStudent(pub Student);

impl FromRequest for CurrentStudent {
    type Error = ServiceError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let credentials = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(auth_service::parse_basic_header);

        Box::pin(async move {
            let state =
                state.ok_or_else(|| ServiceError::Internal("application state missing".into()))?;
            let Some((email, password)) = credentials else {
                debug!("Missing or malformed Authorization header");
                return Err(ServiceError::missing_credentials());
            };
            let student = auth_service::authenticate(state.store.as_ref(), &email, &password).await?;
            Ok(CurrentStudent(student))
        })
    }
}

pub async fn login(
    state: web::Data<AppState>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    let response = auth_service::login(state.store.as_ref(), &credentials).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn logout(student: CurrentStudent) -> Result<HttpResponse, ServiceError> {
    info!("Student {} logged out", student.0.email);
    Ok(HttpResponse::Ok().json(ActionResponse {
        success: true,
        message: None,
    }))
}

pub async fn current_user(student: CurrentStudent) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(StudentResponse::from(&student.0)))
}
