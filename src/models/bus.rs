use super::time::{hhmm, hhmm_opt};
use chrono::{NaiveDate, NaiveTime};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripType {
    #[default]
    Return,
    Weekend,
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripType::Return => f.write_str("RETURN"),
            TripType::Weekend => f.write_str("WEEKEND"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Stop {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_pickup: bool,
    #[serde(default)]
    pub is_drop: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Bus {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub bus_no: String,
    pub route_name: String,
    pub from_location: String,
    pub to_location: String,
    pub departure_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub departure_time: NaiveTime,
    #[serde(default, with = "hhmm_opt")]
    pub return_time: Option<NaiveTime>,
    pub capacity: i32,
    #[serde(default = "default_trip_types")]
    pub trip_types: Vec<TripType>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

fn default_trip_types() -> Vec<TripType> {
    vec![TripType::Return]
}

impl Bus {
    pub fn is_full(&self, confirmed: i64) -> bool {
        confirmed >= i64::from(self.capacity)
    }

    pub fn available_seats(&self, confirmed: i64) -> i64 {
        (i64::from(self.capacity) - confirmed).max(0)
    }

    /// Active stops only; inactive ones stay on the record for history.
    pub fn active_stop(&self, stop_id: i64) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == stop_id && s.is_active)
    }

    pub fn route_display(&self) -> String {
        format!("{} → {}", self.from_location, self.to_location)
    }
}

/// A bus as the API exposes it, with occupancy derived from confirmed bookings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BusResponse {
    pub id: String,
    pub bus_no: String,
    pub route_name: String,
    #[serde(default)]
    pub from_location: String,
    #[serde(default)]
    pub to_location: String,
    #[serde(default)]
    pub route_display: String,
    pub departure_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub departure_time: NaiveTime,
    #[serde(default, with = "hhmm_opt")]
    pub return_time: Option<NaiveTime>,
    pub capacity: i32,
    pub available_seats: i64,
    pub is_full: bool,
    #[serde(default = "default_trip_types")]
    pub trip_types: Vec<TripType>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl BusResponse {
    pub fn from_bus(bus: &Bus, confirmed: i64) -> Self {
        Self {
            id: bus.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            bus_no: bus.bus_no.clone(),
            route_name: bus.route_name.clone(),
            from_location: bus.from_location.clone(),
            to_location: bus.to_location.clone(),
            route_display: bus.route_display(),
            departure_date: bus.departure_date,
            departure_time: bus.departure_time,
            return_time: bus.return_time,
            capacity: bus.capacity,
            available_seats: bus.available_seats(confirmed),
            is_full: bus.is_full(confirmed),
            trip_types: bus.trip_types.clone(),
            stops: bus.stops.clone(),
        }
    }

    pub fn pickup_stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| s.is_active && s.is_pickup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(capacity: i32) -> Bus {
        Bus {
            id: Some(ObjectId::new()),
            bus_no: "TN-01".into(),
            route_name: "Campus Express".into(),
            from_location: "Campus".into(),
            to_location: "Central".into(),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            return_time: None,
            capacity,
            trip_types: vec![TripType::Return],
            stops: vec![
                Stop { id: 1, name: "Gate".into(), is_pickup: true, is_drop: false, is_active: true },
                Stop { id: 2, name: "Depot".into(), is_pickup: true, is_drop: true, is_active: false },
            ],
        }
    }

    #[test]
    fn occupancy_is_derived_from_confirmed_count() {
        let bus = bus(2);
        let resp = BusResponse::from_bus(&bus, 1);
        assert_eq!(resp.available_seats, 1);
        assert!(!resp.is_full);

        let resp = BusResponse::from_bus(&bus, 3);
        assert_eq!(resp.available_seats, 0);
        assert!(resp.is_full);
    }

    #[test]
    fn inactive_stops_are_not_selectable() {
        let bus = bus(10);
        assert!(bus.active_stop(1).is_some());
        assert!(bus.active_stop(2).is_none());
        assert!(bus.active_stop(9).is_none());
    }

    #[test]
    fn wire_times_are_hours_and_minutes() {
        let json = serde_json::to_value(BusResponse::from_bus(&bus(40), 0)).unwrap();
        assert_eq!(json["departure_time"], "08:00");
        assert_eq!(json["departure_date"], "2026-10-19");
        assert_eq!(json["trip_types"][0], "RETURN");
        assert_eq!(json["route_display"], "Campus → Central");
    }
}
