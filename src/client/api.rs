//! Thin typed wrapper over the booking service's HTTP/JSON API.

use log::{debug, info, warn};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use super::error::{extract_message, ApiError};
use crate::models::{
    ActionResponse, BookingResponse, BusResponse, CreateBookingRequest, CreateBookingResponse,
    CurrentBookingResponse, LoginRequest, LoginResponse, ResendOtpRequest, StudentResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::services::auth::basic_header;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// What `POST /bookings/` produced: a booking awaiting its emailed code, or
/// one the server confirmed straight away.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    PendingOtp {
        pending_booking_id: String,
        message: Option<String>,
    },
    Confirmed(BookingResponse),
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    credential: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        if base_url.trim().is_empty() {
            return Err(ApiError::InvalidUrl("URL cannot be empty".into()));
        }
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("college-transport/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            credential: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The `Authorization` header value in use, if any.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    pub fn set_basic_auth(&mut self, email: &str, password: &str) {
        self.credential = Some(basic_header(email, password));
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = self.http.request(method, url);
        match &self.credential {
            Some(credential) => {
                builder = builder.header(header::AUTHORIZATION, credential);
            }
            None => debug!("No credential available for {}", endpoint),
        }
        builder
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = extract_message(status.as_u16(), &body);
            debug!("API error {}: {}", status, message);
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.execute(self.request(Method::GET, endpoint)).await
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::POST, endpoint).json(body))
            .await
    }

    async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.execute(self.request(Method::DELETE, endpoint)).await
    }

    /// Installs the Basic credential before calling `/login/` and drops it
    /// again if the login fails for any reason.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<StudentResponse, ApiError> {
        self.set_basic_auth(email, password);
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let result: Result<LoginResponse, ApiError> = self.post("/login/", &request).await;
        match result {
            Ok(response) if response.success => {
                info!("Logged in as {}", response.user.email);
                Ok(response.user)
            }
            Ok(_) => {
                self.clear_credential();
                Err(ApiError::Http {
                    status: 400,
                    message: "Invalid email or password".into(),
                })
            }
            Err(e) => {
                self.clear_credential();
                Err(e)
            }
        }
    }

    /// Tells the server, then forgets the credential whatever the outcome.
    pub async fn logout(&mut self) {
        if self.credential.is_some() {
            let result: Result<ActionResponse, ApiError> = self.post("/logout/", &json!({})).await;
            if let Err(e) = result {
                warn!("Logout API call failed, clearing local auth anyway: {}", e);
            }
        }
        self.clear_credential();
    }

    pub async fn current_user(&self) -> Result<StudentResponse, ApiError> {
        self.get("/user/").await
    }

    pub async fn get_buses(&self) -> Result<Vec<BusResponse>, ApiError> {
        self.get("/buses/").await
    }

    pub async fn create_booking(
        &self,
        request: &CreateBookingRequest,
    ) -> Result<BookingOutcome, ApiError> {
        let response: CreateBookingResponse = self.post("/bookings/", request).await?;
        match response {
            CreateBookingResponse {
                otp_sent: true,
                pending_booking_id: Some(pending_booking_id),
                message,
                ..
            } => Ok(BookingOutcome::PendingOtp {
                pending_booking_id,
                message,
            }),
            CreateBookingResponse {
                booking: Some(booking),
                ..
            } => Ok(BookingOutcome::Confirmed(booking)),
            _ => Err(ApiError::Decode(
                "booking response carried neither a pending id nor a booking".into(),
            )),
        }
    }

    pub async fn current_booking(&self) -> Result<Option<BookingResponse>, ApiError> {
        let response: CurrentBookingResponse = self.get("/bookings/current/").await?;
        Ok(response.booking)
    }

    pub async fn cancel_booking(&self) -> Result<ActionResponse, ApiError> {
        let response: ActionResponse = self.delete("/bookings/cancel/").await?;
        if !response.success {
            return Err(ApiError::Http {
                status: 400,
                message: response
                    .message
                    .unwrap_or_else(|| "Failed to cancel booking".into()),
            });
        }
        Ok(response)
    }

    pub async fn verify_booking_otp(
        &self,
        pending_booking_id: &str,
        otp: &str,
    ) -> Result<VerifyOtpResponse, ApiError> {
        let request = VerifyOtpRequest {
            pending_booking_id: pending_booking_id.to_string(),
            otp: otp.to_string(),
        };
        self.post("/bookings/verify-otp/", &request).await
    }

    pub async fn resend_otp(&self, booking_id: &str) -> Result<ActionResponse, ApiError> {
        let request = ResendOtpRequest {
            booking_id: booking_id.to_string(),
        };
        self.post("/bookings/resend-otp/", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_validated_and_normalised() {
        assert!(matches!(ApiClient::new(""), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(ApiClient::new("localhost:8000/api"), Err(ApiError::InvalidUrl(_))));

        let client = ApiClient::new("http://localhost:8000/api//").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn basic_credential_is_encoded() {
        let mut client = ApiClient::new(DEFAULT_API_BASE).unwrap();
        client.set_basic_auth("asha@college.edu", "secret");
        // base64("asha@college.edu:secret")
        assert_eq!(
            client.credential(),
            Some("Basic YXNoYUBjb2xsZWdlLmVkdTpzZWNyZXQ=")
        );
        client.clear_credential();
        assert_eq!(client.credential(), None);
    }
}
