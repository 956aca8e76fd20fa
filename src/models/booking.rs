use super::bus::{BusResponse, Stop, TripType};
use super::time::{hhmm, hhmm_opt};
use super::user::StudentResponse;
use crate::otp::OtpChallenge;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: ObjectId,
    pub bus_id: ObjectId,
    pub booking_date: DateTime<Utc>,
    pub trip_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub departure_time: NaiveTime,
    #[serde(default, with = "hhmm_opt")]
    pub return_time: Option<NaiveTime>,
    pub trip_type: TripType,
    pub from_location: String,
    pub to_location: String,
    #[serde(default)]
    pub selected_stop_id: Option<i64>,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpChallenge>,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }
}

/// Body of `POST /bookings/`. Dates and times stay raw strings so the
/// service can report per-field errors instead of a single decode failure.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub bus_id: String,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub trip_date: String,
    #[serde(default)]
    pub departure_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_time: Option<String>,
    #[serde(default)]
    pub from_location: String,
    #[serde(default)]
    pub to_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_stop_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BookingResponse {
    pub id: String,
    pub student: StudentResponse,
    pub bus: BusResponse,
    pub booking_date: DateTime<Utc>,
    pub trip_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub departure_time: NaiveTime,
    #[serde(default, with = "hhmm_opt")]
    pub return_time: Option<NaiveTime>,
    pub is_return_trip: bool,
    pub trip_type: TripType,
    pub from_location: String,
    pub to_location: String,
    #[serde(default)]
    pub selected_stop: Option<Stop>,
    pub status: BookingStatus,
}

impl BookingResponse {
    pub fn new(booking: &Booking, student: StudentResponse, bus: BusResponse) -> Self {
        let selected_stop = booking
            .selected_stop_id
            .and_then(|id| bus.stops.iter().find(|s| s.id == id).cloned());
        Self {
            id: booking.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            student,
            bus,
            booking_date: booking.booking_date,
            trip_date: booking.trip_date,
            departure_time: booking.departure_time,
            return_time: booking.return_time,
            is_return_trip: booking.trip_type == TripType::Return,
            trip_type: booking.trip_type,
            from_location: booking.from_location.clone(),
            to_location: booking.to_location.clone(),
            selected_stop,
            status: booking.status,
        }
    }

    /// Where the student boards: the chosen stop, else the trip origin.
    pub fn pickup_point(&self) -> &str {
        self.selected_stop
            .as_ref()
            .map_or(self.from_location.as_str(), |s| s.name.as_str())
    }
}

/// `201` body of `POST /bookings/`. Carries either the pending id (OTP flow)
/// or the confirmed booking (direct flow).
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CreateBookingResponse {
    pub success: bool,
    #[serde(default)]
    pub otp_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CurrentBookingResponse {
    pub booking: Option<BookingResponse>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub pending_booking_id: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VerifyOtpResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub booking: BookingResponse,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ResendOtpRequest {
    #[serde(default)]
    pub booking_id: String,
}
