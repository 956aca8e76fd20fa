//! Outbound email: OTP codes and booking notices.

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::models::{Booking, Bus, Stop, Student};
use crate::otp::OtpChallenge;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail relay rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(
            "Email to {} | {}\n{}",
            email.to, email.subject, email.text
        );
        Ok(())
    }
}

/// Delivers through an HTTP mail relay that accepts
/// `{from, to, subject, text}` JSON with a bearer key.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let mut request = self.http.post(&self.endpoint).json(&RelayMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Mail relay returned {} for {}", status, email.to);
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        info!("Sent '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

/// Keeps every message in memory; handy for tests and local demos.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_to(&self, address: &str) -> Option<Email> {
        self.sent()
            .into_iter()
            .rev()
            .find(|email| email.to == address)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email);
        Ok(())
    }
}

fn trip_lines(booking: &Booking, bus: &Bus, stop: Option<&Stop>) -> String {
    let mut lines = vec![
        format!("- Bus Number: {}", bus.bus_no),
        format!("- Route: {}", bus.route_name),
        format!("- From: {}", booking.from_location),
        format!("- To: {}", booking.to_location),
    ];
    if let Some(stop) = stop {
        lines.push(format!("- Pickup Stop: {}", stop.name));
    }
    lines.push(format!(
        "- Departure Time: {}",
        booking.departure_time.format("%H:%M")
    ));
    lines.push(format!("- Trip Date: {}", booking.trip_date.format("%Y-%m-%d")));
    lines.join("\n")
}

pub fn otp_email(student: &Student, booking: &Booking, bus: &Bus, otp: &OtpChallenge) -> Email {
    let stop = booking.selected_stop_id.and_then(|id| bus.active_stop(id));
    Email {
        to: student.email.clone(),
        subject: format!("Your booking code - {}", bus.route_name),
        text: format!(
            "Dear {},\n\nYour one-time code is {}.\nIt expires at {} UTC.\n\nTrip Details:\n{}\n\nIf you did not request this booking, ignore this email.\n\nCollege Transport Team",
            student.full_name(),
            otp.code,
            otp.expires_at.format("%Y-%m-%d %H:%M"),
            trip_lines(booking, bus, stop),
        ),
    }
}

pub fn confirmation_email(student: &Student, booking: &Booking, bus: &Bus) -> Email {
    let stop = booking.selected_stop_id.and_then(|id| bus.active_stop(id));
    Email {
        to: student.email.clone(),
        subject: format!("Booking Confirmation - {}", bus.route_name),
        text: format!(
            "Dear {},\n\nYour booking has been confirmed!\n\nBooking Details:\n{}\n- Booking Date: {}\n\nPlease arrive at the pickup point 10 minutes before departure time.\n\nThank you!\nCollege Transport Team",
            student.full_name(),
            trip_lines(booking, bus, stop),
            booking.booking_date.format("%Y-%m-%d %H:%M"),
        ),
    }
}

pub fn cancellation_email(student: &Student, booking: &Booking, bus: &Bus) -> Email {
    Email {
        to: student.email.clone(),
        subject: format!("Booking Cancelled - {}", bus.route_name),
        text: format!(
            "Dear {},\n\nYour booking on {} for {} has been cancelled.\n\nCollege Transport Team",
            student.full_name(),
            bus.bus_no,
            booking.trip_date.format("%Y-%m-%d"),
        ),
    }
}
