use serde::{Deserialize, Serialize};

/// Optional filters for the staff pickup and drop-off lists.
#[derive(Deserialize, Debug, Default)]
pub struct ReportQuery {
    pub bus_id: Option<String>,
    pub trip_date: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub point: String,
    pub student_name: String,
    pub roll_no: String,
    pub dept: String,
    pub phone_number: String,
    pub trip_date: String,
    pub departure_time: String,
}

/// Confirmed passengers of one bus, sorted by boarding or alighting point.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BusManifest {
    pub bus_id: String,
    pub bus_no: String,
    pub route_name: String,
    pub rows: Vec<ManifestRow>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Utilization {
    pub bus_no: String,
    pub route_name: String,
    pub capacity: i32,
    pub booking_count: i64,
    pub utilization_percent: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuickStats {
    pub total_students: u64,
    pub total_buses: usize,
    pub total_bookings: usize,
    pub pending_bookings: usize,
    pub confirmed_bookings: usize,
    pub recent_bookings: usize,
    pub bus_utilization: Vec<Utilization>,
}
