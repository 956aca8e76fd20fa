use actix_web::{http::StatusCode, test, web, App};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Utc, Weekday};
use serde_json::{json, Value};
use std::sync::Arc;

use college_transport::config::BookingSettings;
use college_transport::db::{MemoryStore, Store};
use college_transport::handlers;
use college_transport::mail::RecordingMailer;
use college_transport::models::{Bus, Stop, Student, TripType};
use college_transport::services::auth::{basic_header, hash_password};
use college_transport::state::AppState;

const PASSWORD: &str = "campus123";

struct Fixture {
    state: web::Data<AppState>,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
}

fn fixture(require_otp: bool) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let settings = BookingSettings {
        require_otp,
        bcrypt_cost: 4,
        ..BookingSettings::default()
    };
    let state = web::Data::new(AppState::new(store.clone(), mailer.clone(), settings));
    Fixture {
        state,
        store,
        mailer,
    }
}

macro_rules! app {
    ($fixture:expr) => {
        test::init_service(
            App::new()
                .app_data($fixture.state.clone())
                .configure(handlers::configure),
        )
        .await
    };
}

async fn add_student(store: &MemoryStore, email: &str, is_staff: bool) -> Student {
    store
        .insert_student(Student {
            id: None,
            email: email.to_string(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            phone_number: "9876543210".into(),
            year: "3".into(),
            roll_no: "21CS042".into(),
            dept: "CSE".into(),
            gender: "F".into(),
            student_type: "REGULAR".into(),
            degree_type: "BTECH".into(),
            password: hash_password(PASSWORD, 4).unwrap(),
            is_active: true,
            is_staff,
            date_joined: Utc::now(),
        })
        .await
        .unwrap()
}

async fn add_bus(store: &MemoryStore, capacity: i32) -> String {
    let bus = store
        .insert_bus(Bus {
            id: None,
            bus_no: format!("TN-09-ZZ-{capacity:04}"),
            route_name: "Campus Express".into(),
            from_location: "College Campus".into(),
            to_location: "Central Station".into(),
            departure_date: Local::now().date_naive(),
            departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            return_time: Some(NaiveTime::from_hms_opt(17, 30, 0).unwrap()),
            capacity,
            trip_types: vec![TripType::Return, TripType::Weekend],
            stops: vec![
                Stop { id: 1, name: "Main Gate".into(), is_pickup: true, is_drop: false, is_active: true },
                Stop { id: 2, name: "Old Depot".into(), is_pickup: true, is_drop: true, is_active: false },
            ],
        })
        .await
        .unwrap();
    bus.id.unwrap().to_hex()
}

fn auth(email: &str) -> (&'static str, String) {
    ("Authorization", basic_header(email, PASSWORD))
}

fn next(weekday: Weekday) -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    date
}

fn booking_body(bus_id: &str, trip_date: NaiveDate) -> Value {
    json!({
        "bus_id": bus_id,
        "trip_type": "RETURN",
        "trip_date": trip_date.format("%Y-%m-%d").to_string(),
        "departure_time": "08:00",
        "from_location": "College Campus",
        "to_location": "Central Station",
        "selected_stop_id": 1
    })
}

async fn pending_code(store: &MemoryStore, email: &str) -> String {
    let student = store.find_student_by_email(email).await.unwrap().unwrap();
    let booking = store
        .find_booking_for_student(student.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    booking.otp.unwrap().code
}

fn wrong_code(code: &str) -> String {
    let first = if code.starts_with('1') { '2' } else { '1' };
    format!("{first}{}", &code[1..])
}

#[actix_web::test]
async fn login_returns_the_student_profile() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/login/")
        .set_json(json!({ "email": "asha@college.edu", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "asha@college.edu");
    assert_eq!(body["user"]["roll_no"], "21CS042");
    assert!(body["user"].get("password").is_none());
}

#[actix_web::test]
async fn wrong_password_is_a_non_field_error() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/login/")
        .set_json(json!({ "email": "asha@college.edu", "password": "nope" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["errors"]["non_field_errors"][0].is_string());
}

#[actix_web::test]
async fn protected_routes_require_basic_credentials() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let app = app!(fx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/user/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("www-authenticate"));

    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["email"], "asha@college.edu");
}

#[actix_web::test]
async fn otp_flow_confirms_only_with_the_right_code() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 40).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(booking_body(&bus_id, next(Weekday::Wed)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["otp_sent"], true);
    let pending_id = body["pending_booking_id"].as_str().unwrap().to_string();

    let otp_mail = fx.mailer.last_to("asha@college.edu").unwrap();
    let code = pending_code(&fx.store, "asha@college.edu").await;
    assert!(otp_mail.text.contains(&code));

    // pending bookings do not take a seat
    let req = test::TestRequest::get()
        .uri("/api/buses/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    let buses: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(buses[0]["available_seats"], 40);

    let req = test::TestRequest::get()
        .uri("/api/bookings/current/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    let current: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(current["booking"]["status"], "pending");
    assert_eq!(current["booking"]["selected_stop"]["name"], "Main Gate");

    let req = test::TestRequest::post()
        .uri("/api/bookings/verify-otp/")
        .insert_header(auth("asha@college.edu"))
        .set_json(json!({ "pending_booking_id": pending_id, "otp": wrong_code(&code) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["otp"][0], "Invalid OTP. 4 attempts remaining.");

    let req = test::TestRequest::post()
        .uri("/api/bookings/verify-otp/")
        .insert_header(auth("asha@college.edu"))
        .set_json(json!({ "pending_booking_id": pending_id, "otp": code }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["booking"]["bus"]["available_seats"], 39);

    let confirmation = fx.mailer.last_to("asha@college.edu").unwrap();
    assert!(confirmation.subject.starts_with("Booking Confirmation"));
}

#[actix_web::test]
async fn resend_issues_a_fresh_code() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 40).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(booking_body(&bus_id, next(Weekday::Thu)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let pending_id = body["pending_booking_id"].as_str().unwrap().to_string();
    let old_code = pending_code(&fx.store, "asha@college.edu").await;

    let req = test::TestRequest::post()
        .uri("/api/bookings/resend-otp/")
        .insert_header(auth("asha@college.edu"))
        .set_json(json!({ "booking_id": pending_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fx.mailer.sent().len(), 2);

    let code = pending_code(&fx.store, "asha@college.edu").await;
    assert!(fx.mailer.last_to("asha@college.edu").unwrap().text.contains(&code));

    let req = test::TestRequest::get()
        .uri("/api/bookings/current/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    let current: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(current["booking"]["status"], "pending");

    let req = test::TestRequest::post()
        .uri("/api/bookings/verify-otp/")
        .insert_header(auth("asha@college.edu"))
        .set_json(json!({ "pending_booking_id": pending_id, "otp": old_code }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["otp"][0], "Invalid OTP. 4 attempts remaining.");

    let req = test::TestRequest::post()
        .uri("/api/bookings/verify-otp/")
        .insert_header(auth("asha@college.edu"))
        .set_json(json!({ "pending_booking_id": pending_id, "otp": code }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn direct_flow_confirms_immediately() {
    let fx = fixture(false);
    add_student(&fx.store, "asha@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 40).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(booking_body(&bus_id, next(Weekday::Tue)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["otp_sent"], false);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["booking"]["is_return_trip"], true);
    assert_eq!(body["booking"]["departure_time"], "08:00");
}

#[actix_web::test]
async fn one_booking_per_student_and_cancel_frees_it() {
    let fx = fixture(false);
    add_student(&fx.store, "asha@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 40).await;
    let app = app!(fx);
    let trip = next(Weekday::Fri);

    let book = || {
        test::TestRequest::post()
            .uri("/api/bookings/")
            .insert_header(auth("asha@college.edu"))
            .set_json(booking_body(&bus_id, trip))
            .to_request()
    };
    let cancel = || {
        test::TestRequest::delete()
            .uri("/api/bookings/cancel/")
            .insert_header(auth("asha@college.edu"))
            .to_request()
    };

    assert_eq!(test::call_service(&app, book()).await.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, book()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["non_field_errors"][0],
        "You already have an active booking"
    );

    let resp = test::call_service(&app, cancel()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert!(fx
        .mailer
        .last_to("asha@college.edu")
        .unwrap()
        .subject
        .starts_with("Booking Cancelled"));

    let resp = test::call_service(&app, cancel()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "No active booking found");

    let req = test::TestRequest::get()
        .uri("/api/bookings/current/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    let current: Value = test::call_and_read_body_json(&app, req).await;
    assert!(current["booking"].is_null());

    assert_eq!(test::call_service(&app, book()).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn full_bus_rejects_new_bookings() {
    let fx = fixture(false);
    add_student(&fx.store, "first@college.edu", false).await;
    add_student(&fx.store, "second@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 1).await;
    let app = app!(fx);
    let trip = next(Weekday::Wed);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("first@college.edu"))
        .set_json(booking_body(&bus_id, trip))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("second@college.edu"))
        .set_json(booking_body(&bus_id, trip))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["bus_id"][0], "Bus is full");
}

#[actix_web::test]
async fn cancelling_on_a_full_bus_frees_the_seat() {
    let fx = fixture(false);
    add_student(&fx.store, "first@college.edu", false).await;
    add_student(&fx.store, "second@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 1).await;
    let app = app!(fx);
    let trip = next(Weekday::Thu);

    let book = |email: &str| {
        test::TestRequest::post()
            .uri("/api/bookings/")
            .insert_header(auth(email))
            .set_json(booking_body(&bus_id, trip))
            .to_request()
    };
    let buses = || {
        test::TestRequest::get()
            .uri("/api/buses/")
            .insert_header(auth("second@college.edu"))
            .to_request()
    };

    assert_eq!(test::call_service(&app, book("first@college.edu")).await.status(), StatusCode::CREATED);
    let listed: Value = test::call_and_read_body_json(&app, buses()).await;
    assert_eq!(listed[0]["available_seats"], 0);
    assert_eq!(listed[0]["is_full"], true);

    let req = test::TestRequest::delete()
        .uri("/api/bookings/cancel/")
        .insert_header(auth("first@college.edu"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let listed: Value = test::call_and_read_body_json(&app, buses()).await;
    assert_eq!(listed[0]["available_seats"], 1);
    assert_eq!(listed[0]["is_full"], false);

    assert_eq!(test::call_service(&app, book("second@college.edu")).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn bus_filled_before_verification_keeps_the_booking_pending() {
    let fx = fixture(true);
    add_student(&fx.store, "first@college.edu", false).await;
    add_student(&fx.store, "second@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 1).await;
    let app = app!(fx);
    let trip = next(Weekday::Wed);

    let mut pending = Vec::new();
    for email in ["first@college.edu", "second@college.edu"] {
        let req = test::TestRequest::post()
            .uri("/api/bookings/")
            .insert_header(auth(email))
            .set_json(booking_body(&bus_id, trip))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["pending_booking_id"].as_str().unwrap().to_string();
        pending.push((email, id, pending_code(&fx.store, email).await));
    }

    let verify = |(email, id, code): &(&str, String, String)| {
        test::TestRequest::post()
            .uri("/api/bookings/verify-otp/")
            .insert_header(auth(email))
            .set_json(json!({ "pending_booking_id": id, "otp": code }))
            .to_request()
    };

    // the second student confirms first and takes the only seat
    assert_eq!(test::call_service(&app, verify(&pending[1])).await.status(), StatusCode::OK);

    let resp = test::call_service(&app, verify(&pending[0])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["bus_id"][0], "Bus is full");

    let req = test::TestRequest::get()
        .uri("/api/bookings/current/")
        .insert_header(auth("first@college.edu"))
        .to_request();
    let current: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(current["booking"]["status"], "pending");
    assert_eq!(current["booking"]["bus"]["is_full"], true);
}

#[actix_web::test]
async fn trip_fields_are_validated() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let bus_id = add_bus(&fx.store, 40).await;
    let app = app!(fx);

    let today = Local::now().date_naive();
    let mut body = booking_body(&bus_id, today);
    body["selected_stop_id"] = json!(2);
    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let errors: Value = test::read_body_json(resp).await;
    assert_eq!(errors["errors"]["trip_date"][0], "Trip date must be in the future");
    assert!(errors["errors"]["selected_stop_id"][0].is_string());

    let mut weekend = booking_body(&bus_id, next(Weekday::Wed));
    weekend["trip_type"] = json!("WEEKEND");
    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(weekend)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let errors: Value = test::read_body_json(resp).await;
    assert_eq!(
        errors["errors"]["trip_date"][0],
        "Weekend trips must be on Saturday or Sunday"
    );

    let mut saturday = booking_body(&bus_id, next(Weekday::Sat));
    saturday["trip_type"] = json!("WEEKEND");
    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(saturday)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    assert!(fx.mailer.last_to("asha@college.edu").is_some());
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let fx = fixture(true);
    add_student(&fx.store, "asha@college.edu", false).await;
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"bus_id\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().starts_with("JSON parse error"));
}

#[actix_web::test]
async fn staff_reports_are_staff_only() {
    let fx = fixture(false);
    add_student(&fx.store, "asha@college.edu", false).await;
    add_student(&fx.store, "office@college.edu", true).await;
    let bus_id = add_bus(&fx.store, 4).await;
    let app = app!(fx);
    let trip = next(Weekday::Tue);

    let req = test::TestRequest::post()
        .uri("/api/bookings/")
        .insert_header(auth("asha@college.edu"))
        .set_json(booking_body(&bus_id, trip))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/admin/stats/")
        .insert_header(auth("asha@college.edu"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/admin/stats/")
        .insert_header(auth("office@college.edu"))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_students"], 2);
    assert_eq!(stats["confirmed_bookings"], 1);
    assert_eq!(stats["bus_utilization"][0]["utilization_percent"], 25.0);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/admin/pickup-list/?trip_date={}",
            trip.format("%Y-%m-%d")
        ))
        .insert_header(auth("office@college.edu"))
        .to_request();
    let lists: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(lists[0]["rows"][0]["point"], "Main Gate");
    assert_eq!(lists[0]["rows"][0]["student_name"], "Asha Rao");
}
