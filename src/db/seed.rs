use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use log::info;

use super::{Store, StoreError};
use crate::models::{Bus, Stop, Student, TripType};

/// What to seed at startup.
#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    /// Replace existing buses instead of seeding only an empty collection.
    pub force: bool,
    pub demo_student: Option<DemoStudent>,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct DemoStudent {
    pub email: String,
    pub password: String,
    pub is_staff: bool,
}

/// Next Monday strictly after `today`.
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let days = 7 - i64::from(today.weekday().num_days_from_monday());
    today + Duration::days(days)
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

fn stop(id: i64, name: &str, is_pickup: bool, is_drop: bool) -> Stop {
    Stop {
        id,
        name: name.to_string(),
        is_pickup,
        is_drop,
        is_active: true,
    }
}

pub fn sample_buses(today: NaiveDate) -> Vec<Bus> {
    let departure_date = next_monday(today);
    let bus = |bus_no: &str,
               route_name: &str,
               to: &str,
               departure: NaiveTime,
               capacity: i32,
               trip_types: Vec<TripType>,
               stops: Vec<Stop>| Bus {
        id: None,
        bus_no: bus_no.to_string(),
        route_name: route_name.to_string(),
        from_location: "College Campus".to_string(),
        to_location: to.to_string(),
        departure_date,
        departure_time: departure,
        return_time: Some(time(17, 30)),
        capacity,
        trip_types,
        stops,
    };

    vec![
        bus(
            "TN-01-AB-1001",
            "Central Station Express",
            "Central Station",
            time(7, 30),
            48,
            vec![TripType::Return],
            vec![
                stop(1, "Main Gate", true, false),
                stop(2, "Hostel Block", true, false),
                stop(3, "Park Town", false, true),
                stop(4, "Central Station", false, true),
            ],
        ),
        bus(
            "TN-01-AB-1002",
            "Tambaram Link",
            "Tambaram",
            time(8, 0),
            40,
            vec![TripType::Return, TripType::Weekend],
            vec![
                stop(1, "Main Gate", true, false),
                stop(2, "Chromepet", false, true),
                stop(3, "Tambaram", false, true),
            ],
        ),
        bus(
            "TN-01-AB-1003",
            "Airport Shuttle",
            "Airport",
            time(6, 45),
            32,
            vec![TripType::Weekend],
            vec![
                stop(1, "Library", true, false),
                stop(2, "Guindy", true, true),
                stop(3, "Airport", false, true),
            ],
        ),
        bus(
            "TN-01-AB-1004",
            "Velachery Loop",
            "Velachery",
            time(8, 15),
            52,
            vec![TripType::Return],
            vec![
                stop(1, "Main Gate", true, false),
                stop(2, "Velachery", false, true),
            ],
        ),
        bus(
            "TN-01-AB-1005",
            "Koyambedu Night Run",
            "Koyambedu",
            time(18, 0),
            14,
            vec![TripType::Weekend],
            Vec::new(),
        ),
    ]
}

pub async fn seed_data(
    store: &dyn Store,
    options: &SeedOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if options.force {
        info!("Force seeding enabled. Clearing buses...");
        store.clear_buses().await?;
    }

    if store.list_buses().await?.is_empty() {
        let buses = sample_buses(Utc::now().date_naive());
        let count = buses.len();
        for bus in buses {
            store.insert_bus(bus).await?;
        }
        info!("Seeded {} buses", count);
    }

    if let Some(demo) = &options.demo_student {
        if store.find_student_by_email(&demo.email).await?.is_none() {
            let student = Student {
                id: None,
                email: demo.email.clone(),
                first_name: "Demo".to_string(),
                last_name: "Student".to_string(),
                phone_number: "9000000000".to_string(),
                year: "2".to_string(),
                roll_no: "DEMO001".to_string(),
                dept: "CSE".to_string(),
                gender: "O".to_string(),
                student_type: "REGULAR".to_string(),
                degree_type: "BTECH".to_string(),
                password: bcrypt::hash(&demo.password, options.bcrypt_cost)?,
                is_active: true,
                is_staff: demo.is_staff,
                date_joined: Utc::now(),
            };
            match store.insert_student(student).await {
                Ok(_) | Err(StoreError::DuplicateStudent(_)) => {}
                Err(e) => return Err(e.into()),
            }
            info!("Seeded demo student {}", demo.email);
        }
    }

    Ok(())
}
