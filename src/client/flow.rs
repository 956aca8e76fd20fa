//! The student's booking lifecycle: none → pending code → confirmed.
//!
//! The server's `status` field is authoritative; local guards only save a
//! round trip for requests that would be refused anyway.

use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use thiserror::Error;

use super::api::{ApiClient, BookingOutcome};
use super::error::ApiError;
use crate::db::seed::next_monday;
use crate::models::time::{parse_date, parse_time};
use crate::models::{BookingResponse, BookingStatus, BusResponse, CreateBookingRequest, TripType};
use crate::otp;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("You already have an active booking. Please cancel it first.")]
    AlreadyBooked,

    #[error("This bus is full. Please select another bus.")]
    BusFull,

    #[error("Bus not found")]
    BusNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("No pending booking to verify.")]
    NoPendingBooking,

    #[error("No active booking.")]
    NoBooking,

    #[error("Please enter the 6-digit code from your email.")]
    InvalidCode,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    NoBooking,
    PendingOtp(BookingResponse),
    /// Created and waiting for its code, but the details could not be
    /// fetched yet. Holds the pending booking id.
    PendingUnloaded(String),
    Confirmed(BookingResponse),
}

impl BookingState {
    pub fn from_current(booking: Option<BookingResponse>) -> Self {
        match booking {
            None => BookingState::NoBooking,
            Some(b) if b.status == BookingStatus::Pending => BookingState::PendingOtp(b),
            Some(b) => BookingState::Confirmed(b),
        }
    }

    pub fn booking(&self) -> Option<&BookingResponse> {
        match self {
            BookingState::NoBooking | BookingState::PendingUnloaded(_) => None,
            BookingState::PendingOtp(b) | BookingState::Confirmed(b) => Some(b),
        }
    }

    /// Whether the server holds a booking for the student, loaded or not.
    pub fn has_booking(&self) -> bool {
        !matches!(self, BookingState::NoBooking)
    }

    pub fn pending_id(&self) -> Option<&str> {
        match self {
            BookingState::PendingOtp(b) => Some(&b.id),
            BookingState::PendingUnloaded(id) => Some(id),
            BookingState::NoBooking | BookingState::Confirmed(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_id().is_some()
    }
}

/// The trip date and departure time chosen on the dashboard, as typed.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSelection {
    pub trip_date: String,
    pub departure_time: String,
    /// `None` picks `RETURN` when the bus offers it.
    pub trip_type: Option<TripType>,
}

impl TripSelection {
    pub fn new(trip_date: impl Into<String>, departure_time: impl Into<String>) -> Self {
        Self {
            trip_date: trip_date.into(),
            departure_time: departure_time.into(),
            trip_type: None,
        }
    }

    pub fn default_for(today: NaiveDate) -> Self {
        Self::new(next_monday(today).format("%Y-%m-%d").to_string(), "08:00")
    }

    pub fn validate(&self) -> Result<(NaiveDate, NaiveTime), FlowError> {
        if self.trip_date.trim().is_empty() {
            return Err(FlowError::Validation("Please select a trip date first.".into()));
        }
        let date = parse_date(&self.trip_date).ok_or_else(|| {
            FlowError::Validation("Trip date must be in YYYY-MM-DD format.".into())
        })?;
        if self.departure_time.trim().is_empty() {
            return Err(FlowError::Validation(
                "Please select a departure time first.".into(),
            ));
        }
        let time = parse_time(&self.departure_time).ok_or_else(|| {
            FlowError::Validation("Departure time must be in HH:MM format.".into())
        })?;
        Ok((date, time))
    }

    fn trip_type_for(&self, bus: &BusResponse) -> TripType {
        self.trip_type.unwrap_or_else(|| {
            if bus.trip_types.contains(&TripType::Return) || bus.trip_types.is_empty() {
                TripType::Return
            } else {
                TripType::Weekend
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct BookingFlow {
    state: BookingState,
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self::new(BookingState::NoBooking)
    }
}

impl BookingFlow {
    pub fn new(state: BookingState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub async fn refresh(&mut self, api: &ApiClient) -> Result<&BookingState, FlowError> {
        self.state = BookingState::from_current(api.current_booking().await?);
        Ok(&self.state)
    }

    /// Local checks that would make the server refuse the booking.
    pub fn check(&self, bus: &BusResponse, selection: &TripSelection) -> Result<(), FlowError> {
        if self.state.has_booking() {
            return Err(FlowError::AlreadyBooked);
        }
        if bus.is_full {
            return Err(FlowError::BusFull);
        }
        selection.validate().map(|_| ())
    }

    /// A failed refresh after the server accepted the booking is logged, not
    /// returned: the booking exists and waits for its code either way.
    pub async fn book(
        &mut self,
        api: &ApiClient,
        bus: &BusResponse,
        selection: &TripSelection,
        selected_stop_id: Option<i64>,
    ) -> Result<BookingOutcome, FlowError> {
        self.check(bus, selection)?;

        let request = CreateBookingRequest {
            bus_id: bus.id.clone(),
            trip_type: selection.trip_type_for(bus),
            trip_date: selection.trip_date.trim().to_string(),
            departure_time: selection.departure_time.trim().to_string(),
            return_time: None,
            from_location: bus.from_location.clone(),
            to_location: bus.to_location.clone(),
            selected_stop_id,
        };
        let outcome = api.create_booking(&request).await?;

        match &outcome {
            BookingOutcome::PendingOtp { pending_booking_id, .. } => {
                info!("Booking {} awaits OTP", pending_booking_id);
                if let Err(e) = self.refresh(api).await {
                    warn!("Could not load pending booking {}: {}", pending_booking_id, e);
                    self.state = BookingState::PendingUnloaded(pending_booking_id.clone());
                }
            }
            BookingOutcome::Confirmed(booking) => {
                self.state = BookingState::Confirmed(booking.clone());
            }
        }
        Ok(outcome)
    }

    /// A rejected code leaves the booking pending.
    pub async fn verify(&mut self, api: &ApiClient, code: &str) -> Result<BookingResponse, FlowError> {
        let Some(pending_id) = self.state.pending_id() else {
            return Err(FlowError::NoPendingBooking);
        };
        let code = code.trim();
        if !otp::is_well_formed(code) {
            return Err(FlowError::InvalidCode);
        }

        let response = api.verify_booking_otp(pending_id, code).await?;
        info!("Booking {} confirmed", response.booking.id);
        self.state = BookingState::Confirmed(response.booking.clone());
        Ok(response.booking)
    }

    /// Asks for a fresh code; the booking stays pending.
    pub async fn resend(&self, api: &ApiClient) -> Result<String, FlowError> {
        let Some(pending_id) = self.state.pending_id() else {
            return Err(FlowError::NoPendingBooking);
        };
        let response = api.resend_otp(pending_id).await?;
        Ok(response
            .message
            .unwrap_or_else(|| "A new OTP has been sent to your email.".into()))
    }

    pub async fn cancel(&mut self, api: &ApiClient) -> Result<(), FlowError> {
        if !self.state.has_booking() {
            return Err(FlowError::NoBooking);
        }
        api.cancel_booking().await?;
        self.state = BookingState::NoBooking;
        Ok(())
    }
}
