use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Confirmation, Store, StoreError};
use crate::models::{Booking, BookingStatus, Bus, Student};
use crate::otp::OtpChallenge;

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    buses: Vec<Bus>,
    bookings: Vec<Booking>,
}

/// Process-local store with the same rules as [`super::MongoDB`]. Every
/// operation runs under one lock, so check-then-insert is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tables {
    fn pending_mut(&mut self, booking_id: ObjectId) -> Option<&mut Booking> {
        self.bookings
            .iter_mut()
            .find(|b| b.id == Some(booking_id) && b.is_pending())
    }

    fn confirmed_on(&self, bus_id: ObjectId) -> i64 {
        self.bookings
            .iter()
            .filter(|b| b.bus_id == bus_id && b.status == BookingStatus::Confirmed)
            .count() as i64
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.lock().students.iter().find(|s| s.email == email).cloned())
    }

    async fn find_student(&self, id: ObjectId) -> Result<Option<Student>, StoreError> {
        Ok(self
            .lock()
            .students
            .iter()
            .find(|s| s.id == Some(id))
            .cloned())
    }

    async fn insert_student(&self, mut student: Student) -> Result<Student, StoreError> {
        let mut tables = self.lock();
        if tables.students.iter().any(|s| s.email == student.email) {
            return Err(StoreError::DuplicateStudent(student.email));
        }
        student.id.get_or_insert_with(ObjectId::new);
        tables.students.push(student.clone());
        Ok(student)
    }

    async fn count_students(&self) -> Result<u64, StoreError> {
        Ok(self.lock().students.len() as u64)
    }

    async fn list_buses(&self) -> Result<Vec<Bus>, StoreError> {
        let mut buses = self.lock().buses.clone();
        buses.sort_by(|a, b| a.bus_no.cmp(&b.bus_no));
        Ok(buses)
    }

    async fn find_bus(&self, id: ObjectId) -> Result<Option<Bus>, StoreError> {
        Ok(self.lock().buses.iter().find(|b| b.id == Some(id)).cloned())
    }

    async fn insert_bus(&self, mut bus: Bus) -> Result<Bus, StoreError> {
        bus.id.get_or_insert_with(ObjectId::new);
        self.lock().buses.push(bus.clone());
        Ok(bus)
    }

    async fn clear_buses(&self) -> Result<(), StoreError> {
        self.lock().buses.clear();
        Ok(())
    }

    async fn confirmed_counts(&self) -> Result<HashMap<ObjectId, i64>, StoreError> {
        let mut counts = HashMap::new();
        for booking in &self.lock().bookings {
            if booking.status == BookingStatus::Confirmed {
                *counts.entry(booking.bus_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn confirmed_count(&self, bus_id: ObjectId) -> Result<i64, StoreError> {
        Ok(self.lock().confirmed_on(bus_id))
    }

    async fn insert_booking(&self, mut booking: Booking) -> Result<Booking, StoreError> {
        let mut tables = self.lock();
        if tables
            .bookings
            .iter()
            .any(|b| b.student_id == booking.student_id)
        {
            return Err(StoreError::DuplicateBooking);
        }
        booking.id.get_or_insert_with(ObjectId::new);
        tables.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn find_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .lock()
            .bookings
            .iter()
            .find(|b| b.student_id == student_id)
            .cloned())
    }

    async fn claim_otp_attempt(
        &self,
        booking_id: ObjectId,
        max_attempts: i32,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.lock();
        let Some(booking) = tables.pending_mut(booking_id) else {
            return Ok(None);
        };
        match booking.otp.as_mut() {
            Some(otp) if otp.attempts < max_attempts => {
                otp.attempts += 1;
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reissue_otp(
        &self,
        booking_id: ObjectId,
        challenge: &OtpChallenge,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.lock();
        Ok(tables.pending_mut(booking_id).map(|booking| {
            booking.otp = Some(challenge.clone());
            booking.clone()
        }))
    }

    async fn confirm_booking(
        &self,
        booking_id: ObjectId,
        capacity: i32,
    ) -> Result<Confirmation, StoreError> {
        let mut tables = self.lock();
        let Some(bus_id) = tables.pending_mut(booking_id).map(|b| b.bus_id) else {
            return Ok(Confirmation::NotPending);
        };
        if tables.confirmed_on(bus_id) >= i64::from(capacity) {
            return Ok(Confirmation::BusFull);
        }
        match tables.pending_mut(booking_id) {
            Some(booking) => {
                booking.status = BookingStatus::Confirmed;
                booking.otp = None;
                Ok(Confirmation::Confirmed(booking.clone()))
            }
            None => Ok(Confirmation::NotPending),
        }
    }

    async fn delete_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.lock();
        let position = tables.bookings.iter().position(|b| b.student_id == student_id);
        Ok(position.map(|i| tables.bookings.remove(i)))
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.lock().bookings.clone())
    }
}
