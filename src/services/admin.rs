//! Staff reports: who boards where, who gets off where, and how full buses are.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::db::{parse_id, Store};
use crate::error::{FieldErrors, ServiceError};
use crate::models::time::parse_date;
use crate::models::{
    Booking, BookingStatus, Bus, BusManifest, ManifestRow, QuickStats, ReportQuery, Student,
    Utilization,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Pickup,
    Dropoff,
}

fn point_for(kind: ManifestKind, booking: &Booking, bus: &Bus) -> String {
    match kind {
        ManifestKind::Pickup => booking
            .selected_stop_id
            .and_then(|id| bus.stops.iter().find(|s| s.id == id))
            .map_or_else(|| booking.from_location.clone(), |s| s.name.clone()),
        ManifestKind::Dropoff => booking.to_location.clone(),
    }
}

pub async fn manifests(
    store: &dyn Store,
    query: &ReportQuery,
    kind: ManifestKind,
) -> Result<Vec<BusManifest>, ServiceError> {
    let mut errors = FieldErrors::new();
    let bus_filter = match query.bus_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match parse_id(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("bus_id", "Bus not found");
                None
            }
        },
        None => None,
    };
    let date_filter = match query.trip_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match parse_date(raw) {
            Some(date) => Some(date),
            None => {
                errors.add("trip_date", "Date has wrong format. Use YYYY-MM-DD.");
                None
            }
        },
        None => None,
    };
    errors.into_result()?;

    let buses = store.list_buses().await?;
    let bookings = store.list_bookings().await?;
    let mut students: HashMap<_, Student> = HashMap::new();

    let mut manifests = Vec::new();
    for bus in buses {
        let Some(bus_id) = bus.id else { continue };
        if bus_filter.is_some_and(|id| id != bus_id) {
            continue;
        }

        let mut rows = Vec::new();
        for booking in bookings.iter().filter(|b| {
            b.bus_id == bus_id
                && b.status == BookingStatus::Confirmed
                && date_filter.map_or(true, |d| b.trip_date == d)
        }) {
            if !students.contains_key(&booking.student_id) {
                if let Some(student) = store.find_student(booking.student_id).await? {
                    students.insert(booking.student_id, student);
                }
            }
            let Some(student) = students.get(&booking.student_id) else {
                continue;
            };
            rows.push(ManifestRow {
                point: point_for(kind, booking, &bus),
                student_name: student.full_name(),
                roll_no: student.roll_no.clone(),
                dept: student.dept.clone(),
                phone_number: student.phone_number.clone(),
                trip_date: booking.trip_date.format("%Y-%m-%d").to_string(),
                departure_time: booking.departure_time.format("%H:%M").to_string(),
            });
        }
        rows.sort_by(|a, b| a.point.cmp(&b.point).then_with(|| a.roll_no.cmp(&b.roll_no)));

        manifests.push(BusManifest {
            bus_id: bus_id.to_hex(),
            bus_no: bus.bus_no,
            route_name: bus.route_name,
            rows,
        });
    }
    Ok(manifests)
}

pub async fn quick_stats(store: &dyn Store, now: DateTime<Utc>) -> Result<QuickStats, ServiceError> {
    let buses = store.list_buses().await?;
    let bookings = store.list_bookings().await?;
    let counts = store.confirmed_counts().await?;
    let last_week = now - Duration::days(7);

    let pending = bookings.iter().filter(|b| b.status == BookingStatus::Pending).count();
    let bus_utilization = buses
        .iter()
        .map(|bus| {
            let booking_count = bus.id.and_then(|id| counts.get(&id).copied()).unwrap_or(0);
            let utilization_percent = if bus.capacity > 0 {
                booking_count as f64 * 100.0 / f64::from(bus.capacity)
            } else {
                0.0
            };
            Utilization {
                bus_no: bus.bus_no.clone(),
                route_name: bus.route_name.clone(),
                capacity: bus.capacity,
                booking_count,
                utilization_percent,
            }
        })
        .collect();

    Ok(QuickStats {
        total_students: store.count_students().await?,
        total_buses: buses.len(),
        total_bookings: bookings.len(),
        pending_bookings: pending,
        confirmed_bookings: bookings.len() - pending,
        recent_bookings: bookings.iter().filter(|b| b.booking_date >= last_week).count(),
        bus_utilization,
    })
}
