//! Page controllers: each owns what its screen shows and talks to the API
//! through the shared client.

use chrono::NaiveDate;
use futures::try_join;
use log::{error, warn};
use std::fmt::Write;

use super::api::{ApiClient, BookingOutcome};
use super::flow::{BookingFlow, BookingState, FlowError, TripSelection};
use super::render::{self, BusCardState};
use super::session::AuthContext;
use crate::models::{BookingResponse, BusResponse, StudentResponse, TripType};

#[derive(Debug, Default)]
pub struct LoginPage {
    error: Option<String>,
}

impl LoginPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the student on success; the failure message stays on the page.
    pub async fn submit(
        &mut self,
        auth: &mut AuthContext,
        email: &str,
        password: &str,
    ) -> Option<StudentResponse> {
        self.error = None;
        match auth.login(email.trim(), password).await {
            Ok(user) => Some(user),
            Err(e) => {
                let message = e.to_string();
                self.error = Some(if message.is_empty() {
                    "Invalid email or password".to_string()
                } else {
                    message
                });
                None
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("College Transport: sign in with your college email\n");
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {error}");
        }
        out
    }
}

const ONE_BOOKING_BANNER: &str =
    "You can hold one booking at a time. Cancel your current booking to choose another bus.";

pub struct Dashboard {
    buses: Vec<BusResponse>,
    flow: BookingFlow,
    selection: TripSelection,
    selected_bus: Option<String>,
    error: Option<String>,
    notice: Option<String>,
}

impl Dashboard {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            buses: Vec::new(),
            flow: BookingFlow::default(),
            selection: TripSelection::default_for(today),
            selected_bus: None,
            error: None,
            notice: None,
        }
    }

    pub fn buses(&self) -> &[BusResponse] {
        &self.buses
    }

    pub fn state(&self) -> &BookingState {
        self.flow.state()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The toast from the last action, if it left one.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn selection(&self) -> &TripSelection {
        &self.selection
    }

    pub fn set_trip(&mut self, trip_date: Option<String>, departure_time: Option<String>) {
        if let Some(date) = trip_date {
            self.selection.trip_date = date;
        }
        if let Some(time) = departure_time {
            self.selection.departure_time = time;
        }
    }

    pub fn set_trip_type(&mut self, trip_type: Option<TripType>) {
        self.selection.trip_type = trip_type;
    }

    pub fn select_bus(&mut self, bus_id: &str) {
        self.selected_bus = Some(bus_id.to_string());
    }

    /// Buses and the current booking, fetched together.
    pub async fn load(&mut self, api: &ApiClient) -> bool {
        self.error = None;
        match try_join!(api.get_buses(), api.current_booking()) {
            Ok((buses, booking)) => {
                self.buses = buses;
                self.flow = BookingFlow::new(BookingState::from_current(booking));
                true
            }
            Err(e) => {
                error!("Failed to load dashboard: {}", e);
                self.error = Some("Failed to load data".into());
                false
            }
        }
    }

    fn fail(&mut self, e: FlowError) {
        warn!("Booking action failed: {}", e);
        self.notice = None;
        self.error = Some(e.to_string());
    }

    pub async fn book(&mut self, api: &ApiClient, bus_id: &str, stop_id: Option<i64>) -> bool {
        self.error = None;
        self.notice = None;
        self.select_bus(bus_id);

        let Some(bus) = self.buses.iter().find(|b| b.id == bus_id).cloned() else {
            self.fail(FlowError::BusNotFound);
            return false;
        };
        match self.flow.book(api, &bus, &self.selection, stop_id).await {
            Ok(BookingOutcome::PendingOtp { .. }) => {
                self.notice =
                    Some("OTP sent to your email. Please verify to confirm booking.".into());
            }
            Ok(BookingOutcome::Confirmed(_)) => {
                self.notice = Some("Booking confirmed! Check your email for details.".into());
            }
            Err(e) => {
                self.fail(e);
                return false;
            }
        }
        self.reload_buses(api).await;
        true
    }

    pub async fn verify(&mut self, api: &ApiClient, code: &str) -> bool {
        self.error = None;
        self.notice = None;
        match self.flow.verify(api, code).await {
            Ok(_) => {
                self.notice = Some("Booking confirmed!".into());
                self.reload_buses(api).await;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn resend(&mut self, api: &ApiClient) -> bool {
        self.error = None;
        match self.flow.resend(api).await {
            Ok(message) => {
                self.notice = Some(message);
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn cancel(&mut self, api: &ApiClient) -> bool {
        self.error = None;
        self.notice = None;
        match self.flow.cancel(api).await {
            Ok(()) => {
                self.notice = Some("Booking cancelled successfully".into());
                self.reload_buses(api).await;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    async fn reload_buses(&mut self, api: &ApiClient) {
        match api.get_buses().await {
            Ok(buses) => self.buses = buses,
            Err(e) => warn!("Could not refresh buses: {}", e),
        }
    }

    pub fn render(&self, student: &StudentResponse) -> String {
        let mut out = String::new();
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "* {notice}\n");
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {error}\n");
        }

        out.push_str(&render::student_info(student));
        out.push('\n');

        let booked_bus = self.flow.state().booking().map(|b| b.bus.id.clone());
        match self.flow.state() {
            BookingState::NoBooking => {}
            BookingState::PendingOtp(booking) => {
                out.push_str("Your booking\n");
                out.push_str(&render::booking_card(booking));
                out.push('\n');
                out.push_str(&render::otp_prompt(booking));
                out.push('\n');
            }
            BookingState::PendingUnloaded(_) => {
                out.push_str("Your booking is waiting for its OTP. Check your email for the code.\n\n");
            }
            BookingState::Confirmed(booking) => {
                out.push_str("Your booking\n");
                out.push_str(&render::booking_card(booking));
                out.push('\n');
            }
        }
        if self.flow.state().has_booking() {
            let _ = writeln!(out, "{ONE_BOOKING_BANNER}\n");
        }

        let _ = writeln!(
            out,
            "Trip date {}  departure {}",
            self.selection.trip_date, self.selection.departure_time
        );
        if self.buses.is_empty() {
            out.push_str("No buses available.\n");
        }
        for bus in &self.buses {
            let state = BusCardState {
                selected: self.selected_bus.as_deref() == Some(bus.id.as_str()),
                booked: booked_bus.as_deref() == Some(bus.id.as_str()),
                busy: false,
            };
            out.push('\n');
            out.push_str(&render::bus_card(bus, state));
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct MyBooking {
    booking: Option<BookingResponse>,
    error: Option<String>,
}

impl MyBooking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booking(&self) -> Option<&BookingResponse> {
        self.booking.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self, api: &ApiClient) -> bool {
        self.error = None;
        match api.current_booking().await {
            Ok(booking) => {
                self.booking = booking;
                true
            }
            Err(e) => {
                error!("Failed to load booking: {}", e);
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn cancel(&mut self, api: &ApiClient) -> bool {
        let mut flow = BookingFlow::new(BookingState::from_current(self.booking.clone()));
        if let Err(e) = flow.cancel(api).await {
            self.error = Some(e.to_string());
            return false;
        }
        self.load(api).await
    }

    pub fn render(&self) -> String {
        let mut out = String::from("My booking\n");
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {error}");
        }
        match &self.booking {
            Some(booking) => out.push_str(&render::booking_card(booking)),
            None => out.push_str("No active booking.\n"),
        }
        out
    }
}

pub struct Profile;

impl Profile {
    pub fn render(student: &StudentResponse) -> String {
        render::profile_card(student)
    }
}
