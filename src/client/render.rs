//! Plain-text views of buses, bookings and the student.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt::Write;

use crate::models::{BookingResponse, BookingStatus, BusResponse, StudentResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatLevel {
    Plenty,
    Few,
    None,
}

impl SeatLevel {
    pub fn for_seats(available: i64) -> Self {
        if available > 5 {
            SeatLevel::Plenty
        } else if available > 0 {
            SeatLevel::Few
        } else {
            SeatLevel::None
        }
    }

    fn marker(self) -> &'static str {
        match self {
            SeatLevel::Plenty => "[+]",
            SeatLevel::Few => "[!]",
            SeatLevel::None => "[x]",
        }
    }
}

/// "Monday, October 19, 2026"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// "8:00 AM"
pub fn clock_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

fn short_date(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

pub fn seat_badge(bus: &BusResponse) -> String {
    let level = SeatLevel::for_seats(bus.available_seats);
    format!("{} {} seats left", level.marker(), bus.available_seats)
}

pub fn book_button(bus: &BusResponse, busy: bool) -> &'static str {
    if busy {
        "Booking..."
    } else if bus.is_full {
        "Bus Full"
    } else {
        "Book This Bus"
    }
}

/// How one bus sits relative to the student looking at the grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusCardState {
    pub selected: bool,
    pub booked: bool,
    pub busy: bool,
}

pub fn bus_card(bus: &BusResponse, state: BusCardState) -> String {
    let mut out = String::new();
    let mut title = format!("{}  {}", bus.bus_no, bus.route_name);
    if state.selected {
        title.push_str("  (selected)");
    }
    if state.booked {
        title.push_str("  (your booking)");
    }
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  {}", seat_badge(bus));
    let _ = writeln!(out, "  Route:     {}", bus.route_display);
    let _ = writeln!(out, "  Departs:   {}", clock_time(bus.departure_time));
    let _ = writeln!(out, "  Date:      {}", bus.departure_date.format("%Y-%m-%d"));
    let _ = writeln!(out, "  Capacity:  {}", bus.capacity);
    let stops: Vec<&str> = bus.pickup_stops().map(|s| s.name.as_str()).collect();
    if !stops.is_empty() {
        let _ = writeln!(out, "  Stops:     {}", stops.join(", "));
    }
    let _ = writeln!(out, "  [{}]  id {}", book_button(bus, state.busy), bus.id);
    out
}

fn status_badge(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "PENDING (awaiting OTP)",
        BookingStatus::Confirmed => "CONFIRMED",
    }
}

pub fn booking_card(booking: &BookingResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Bus {}  {}",
        booking.bus.bus_no,
        status_badge(booking.status)
    );
    let _ = writeln!(out, "  {} → {}", booking.from_location, booking.to_location);
    let _ = writeln!(out, "  Pickup:    {}", booking.pickup_point());
    let _ = writeln!(out, "  Trip:      {}", long_date(booking.trip_date));
    let _ = writeln!(out, "  Departs:   {}", clock_time(booking.departure_time));
    if let Some(return_time) = booking.return_time {
        let _ = writeln!(out, "  Returns:   {}", clock_time(return_time));
    }
    let _ = writeln!(out, "  Type:      {}", booking.trip_type);
    let _ = writeln!(out, "  Booked on: {}", short_date(booking.booking_date));
    out
}

pub fn student_info(student: &StudentResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} <{}>", student.full_name(), student.email);
    let _ = writeln!(
        out,
        "  Roll {} | {} | Year {}",
        student.roll_no, student.dept, student.year
    );
    out
}

pub fn profile_card(student: &StudentResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "({})  {}", student.initials(), student.full_name());
    let rows = [
        ("Email", &student.email),
        ("Phone", &student.phone_number),
        ("Roll no", &student.roll_no),
        ("Department", &student.dept),
        ("Year", &student.year),
        ("Gender", &student.gender),
        ("Student type", &student.student_type),
        ("Degree", &student.degree_type),
    ];
    for (label, value) in rows {
        let value = if value.is_empty() { "-" } else { value.as_str() };
        let _ = writeln!(out, "  {:<13} {}", format!("{label}:"), value);
    }
    out
}

pub fn otp_prompt(pending: &BookingResponse) -> String {
    format!(
        "Enter the 6-digit OTP sent to {} to confirm bus {}.\n  transport verify <code>   |   transport resend\n",
        pending.student.email, pending.bus.bus_no
    )
}
