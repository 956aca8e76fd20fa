use async_trait::async_trait;
use futures::StreamExt;
use log::{error, info, warn};
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use super::{Confirmation, Store, StoreError};
use crate::models::{Booking, BookingStatus, Bus, Student};
use crate::otp::OtpChallenge;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db_name: String,
}

impl MongoDB {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        Ok(MongoDB {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn students(&self) -> Collection<Student> {
        self.client.database(&self.db_name).collection("students")
    }

    fn buses(&self) -> Collection<Bus> {
        self.client.database(&self.db_name).collection("buses")
    }

    fn bookings(&self) -> Collection<Booking> {
        self.client.database(&self.db_name).collection("bookings")
    }

    /// Unique indexes back the one-booking-per-student rule and email logins.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = IndexOptions::builder().unique(true).build();

        self.bookings()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "student_id": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;
        self.students()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;
        self.buses()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "bus_no": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await?;

        info!("MongoDB indexes ensured on {}", self.db_name);
        Ok(())
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        items.push(result?);
    }
    Ok(items)
}

fn updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn pending(booking_id: ObjectId) -> Document {
    doc! { "_id": booking_id, "status": BookingStatus::Pending.as_str() }
}

fn count_field(doc: &Document) -> i64 {
    match doc.get("count") {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        _ => 0,
    }
}

#[async_trait]
impl Store for MongoDB {
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.students().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_student(&self, id: ObjectId) -> Result<Option<Student>, StoreError> {
        Ok(self.students().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_student(&self, mut student: Student) -> Result<Student, StoreError> {
        student.id.get_or_insert_with(ObjectId::new);
        match self.students().insert_one(&student, None).await {
            Ok(_) => Ok(student),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateStudent(student.email)),
            Err(e) => Err(e.into()),
        }
    }

    async fn count_students(&self) -> Result<u64, StoreError> {
        Ok(self.students().count_documents(None, None).await?)
    }

    async fn list_buses(&self) -> Result<Vec<Bus>, StoreError> {
        let cursor = self.buses().find(None, None).await?;
        let mut buses = collect(cursor).await?;
        buses.sort_by(|a, b| a.bus_no.cmp(&b.bus_no));
        Ok(buses)
    }

    async fn find_bus(&self, id: ObjectId) -> Result<Option<Bus>, StoreError> {
        Ok(self.buses().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_bus(&self, mut bus: Bus) -> Result<Bus, StoreError> {
        bus.id.get_or_insert_with(ObjectId::new);
        self.buses().insert_one(&bus, None).await?;
        Ok(bus)
    }

    async fn clear_buses(&self) -> Result<(), StoreError> {
        let result = self.buses().delete_many(doc! {}, None).await?;
        info!("Removed {} buses", result.deleted_count);
        Ok(())
    }

    async fn confirmed_counts(&self) -> Result<HashMap<ObjectId, i64>, StoreError> {
        let pipeline = vec![
            doc! { "$match": { "status": BookingStatus::Confirmed.as_str() } },
            doc! { "$group": { "_id": "$bus_id", "count": { "$sum": 1 } } },
        ];
        let cursor = self.bookings().aggregate(pipeline, None).await?;
        let groups = collect(cursor).await?;

        let mut counts = HashMap::new();
        for group in groups {
            match group.get_object_id("_id") {
                Ok(bus_id) => {
                    counts.insert(bus_id, count_field(&group));
                }
                Err(e) => error!("Unexpected booking group key: {}", e),
            }
        }
        Ok(counts)
    }

    async fn confirmed_count(&self, bus_id: ObjectId) -> Result<i64, StoreError> {
        let count = self
            .bookings()
            .count_documents(
                doc! { "bus_id": bus_id, "status": BookingStatus::Confirmed.as_str() },
                None,
            )
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_booking(&self, mut booking: Booking) -> Result<Booking, StoreError> {
        booking.id.get_or_insert_with(ObjectId::new);
        match self.bookings().insert_one(&booking, None).await {
            Ok(_) => Ok(booking),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateBooking),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .bookings()
            .find_one(doc! { "student_id": student_id }, None)
            .await?)
    }

    async fn claim_otp_attempt(
        &self,
        booking_id: ObjectId,
        max_attempts: i32,
    ) -> Result<Option<Booking>, StoreError> {
        let mut filter = pending(booking_id);
        filter.insert("otp.attempts", doc! { "$lt": max_attempts });
        Ok(self
            .bookings()
            .find_one_and_update(filter, doc! { "$inc": { "otp.attempts": 1 } }, updated())
            .await?)
    }

    async fn reissue_otp(
        &self,
        booking_id: ObjectId,
        challenge: &OtpChallenge,
    ) -> Result<Option<Booking>, StoreError> {
        let otp = bson::to_bson(challenge)?;
        Ok(self
            .bookings()
            .find_one_and_update(pending(booking_id), doc! { "$set": { "otp": otp } }, updated())
            .await?)
    }

    /// Confirms first, then re-counts the bus. A confirm that pushed the bus
    /// past `capacity` is put back to pending with its code untouched.
    async fn confirm_booking(
        &self,
        booking_id: ObjectId,
        capacity: i32,
    ) -> Result<Confirmation, StoreError> {
        let confirmed = BookingStatus::Confirmed.as_str();
        let Some(booking) = self
            .bookings()
            .find_one_and_update(
                pending(booking_id),
                doc! { "$set": { "status": confirmed } },
                updated(),
            )
            .await?
        else {
            return Ok(Confirmation::NotPending);
        };

        if self.confirmed_count(booking.bus_id).await? > i64::from(capacity) {
            warn!("Bus {} over capacity, reverting booking {}", booking.bus_id, booking_id);
            self.bookings()
                .update_one(
                    doc! { "_id": booking_id, "status": confirmed },
                    doc! { "$set": { "status": BookingStatus::Pending.as_str() } },
                    None,
                )
                .await?;
            return Ok(Confirmation::BusFull);
        }

        let booking = self
            .bookings()
            .find_one_and_update(
                doc! { "_id": booking_id },
                doc! { "$unset": { "otp": "" } },
                updated(),
            )
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(Confirmation::Confirmed(booking))
    }

    async fn delete_booking_for_student(
        &self,
        student_id: ObjectId,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .bookings()
            .find_one_and_delete(doc! { "student_id": student_id }, None)
            .await?)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let cursor = self.bookings().find(None, None).await?;
        collect(cursor).await
    }
}
