pub mod memory;
pub mod mongodb;
pub mod seed;

pub use self::memory::MemoryStore;
pub use self::mongodb::MongoDB;

use crate::models::{Booking, Bus, Student};
use crate::otp::OtpChallenge;
use ::mongodb::bson::oid::ObjectId;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),

    #[error("student already holds a booking")]
    DuplicateBooking,

    #[error("email already registered: {0}")]
    DuplicateStudent(String),

    #[error("record not found")]
    NotFound,

    #[error("invalid id `{0}`")]
    InvalidId(String),

    #[error("could not encode document: {0}")]
    Encode(#[from] ::mongodb::bson::ser::Error),
}

/// Result of [`Store::confirm_booking`].
#[derive(Debug)]
pub enum Confirmation {
    Confirmed(Booking),
    BusFull,
    NotPending,
}

pub fn parse_id(raw: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| StoreError::InvalidId(raw.to_string()))
}

/// Persistence for students, buses and bookings.
///
/// Implementations must reject a second booking for the same student with
/// [`StoreError::DuplicateBooking`] atomically with the insert. The OTP and
/// confirm operations are conditional writes: concurrent callers never see
/// an attempt go uncounted or a bus confirmed past its capacity.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError>;
    async fn find_student(&self, id: ObjectId) -> Result<Option<Student>, StoreError>;
    async fn insert_student(&self, student: Student) -> Result<Student, StoreError>;
    async fn count_students(&self) -> Result<u64, StoreError>;

    async fn list_buses(&self) -> Result<Vec<Bus>, StoreError>;
    async fn find_bus(&self, id: ObjectId) -> Result<Option<Bus>, StoreError>;
    async fn insert_bus(&self, bus: Bus) -> Result<Bus, StoreError>;
    async fn clear_buses(&self) -> Result<(), StoreError>;

    /// Confirmed bookings per bus. Buses without any are absent.
    async fn confirmed_counts(&self) -> Result<HashMap<ObjectId, i64>, StoreError>;
    async fn confirmed_count(&self, bus_id: ObjectId) -> Result<i64, StoreError>;

    async fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError>;
    async fn find_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError>;

    /// Counts one verification attempt against a pending booking's code.
    /// Returns the booking as updated, or `None` when it is no longer pending
    /// or already has `max_attempts` attempts.
    async fn claim_otp_attempt(
        &self,
        booking_id: ObjectId,
        max_attempts: i32,
    ) -> Result<Option<Booking>, StoreError>;

    /// Replaces the code of a pending booking. `None` when it is no longer pending.
    async fn reissue_otp(
        &self,
        booking_id: ObjectId,
        challenge: &OtpChallenge,
    ) -> Result<Option<Booking>, StoreError>;

    /// Confirms a pending booking and drops its code, unless its bus already
    /// holds `capacity` confirmed bookings.
    async fn confirm_booking(
        &self,
        booking_id: ObjectId,
        capacity: i32,
    ) -> Result<Confirmation, StoreError>;

    async fn delete_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError>;
    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;
}
