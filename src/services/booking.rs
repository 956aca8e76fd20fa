use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use log::{error, info, warn};
use mongodb::bson::oid::ObjectId;

use crate::config::BookingSettings;
use crate::db::{parse_id, Confirmation, Store, StoreError};
use crate::error::{FieldErrors, ServiceError};
use crate::mail::{self, Mailer};
use crate::models::time::{parse_date, parse_time};
use crate::models::{
    ActionResponse, Booking, BookingResponse, BookingStatus, Bus, BusResponse,
    CreateBookingRequest, CreateBookingResponse, CurrentBookingResponse, ResendOtpRequest,
    Student, StudentResponse, TripType, VerifyOtpRequest, VerifyOtpResponse,
};
use crate::otp::{OtpChallenge, OtpError};
use crate::state::AppState;

pub const ALREADY_BOOKED: &str = "You already have an active booking";
pub const BUS_FULL: &str = "Bus is full";
const REQUIRED: &str = "This field is required.";
const NO_PENDING: &str = "No pending booking found";

#[derive(Debug, Clone, Copy, PartialEq)]
struct TripTimes {
    trip_date: NaiveDate,
    departure_time: NaiveTime,
    return_time: Option<NaiveTime>,
}

/// Field-level checks that need neither the store nor the bus.
fn validate_trip(
    request: &CreateBookingRequest,
    today: NaiveDate,
    errors: &mut FieldErrors,
) -> Option<TripTimes> {
    let trip_date = if request.trip_date.trim().is_empty() {
        errors.add("trip_date", REQUIRED);
        None
    } else {
        match parse_date(&request.trip_date) {
            None => {
                errors.add("trip_date", "Date has wrong format. Use YYYY-MM-DD.");
                None
            }
            Some(date) if date <= today => {
                errors.add("trip_date", "Trip date must be in the future");
                None
            }
            Some(date)
                if request.trip_type == TripType::Weekend
                    && !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) =>
            {
                errors.add("trip_date", "Weekend trips must be on Saturday or Sunday");
                None
            }
            Some(date) => Some(date),
        }
    };

    let departure_time = if request.departure_time.trim().is_empty() {
        errors.add("departure_time", REQUIRED);
        None
    } else {
        let parsed = parse_time(&request.departure_time);
        if parsed.is_none() {
            errors.add("departure_time", "Time has wrong format. Use hh:mm.");
        }
        parsed
    };

    let return_time = match request.return_time.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_time(raw).map(Some).ok_or(()),
    };
    if return_time.is_err() {
        errors.add("return_time", "Time has wrong format. Use hh:mm.");
    }

    Some(TripTimes {
        trip_date: trip_date?,
        departure_time: departure_time?,
        return_time: return_time.ok()?,
    })
}

/// Booking rules on top of a [`Store`] and a [`Mailer`].
pub struct BookingService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    settings: &'a BookingSettings,
}

impl<'a> BookingService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: state.store.as_ref(),
            mailer: state.mailer.as_ref(),
            settings: &state.settings,
        }
    }

    fn student_id(student: &Student) -> Result<ObjectId, ServiceError> {
        student
            .id
            .ok_or_else(|| ServiceError::Internal("authenticated student has no id".into()))
    }

    pub async fn list_buses(&self) -> Result<Vec<BusResponse>, ServiceError> {
        let buses = self.store.list_buses().await?;
        let counts = self.store.confirmed_counts().await?;
        Ok(buses
            .iter()
            .map(|bus| {
                let confirmed = bus.id.and_then(|id| counts.get(&id).copied()).unwrap_or(0);
                BusResponse::from_bus(bus, confirmed)
            })
            .collect())
    }

    async fn load_bus(&self, bus_id: ObjectId) -> Result<Bus, ServiceError> {
        self.store
            .find_bus(bus_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Bus not found".into()))
    }

    async fn respond(&self, booking: &Booking, student: &Student) -> Result<BookingResponse, ServiceError> {
        let bus = self.load_bus(booking.bus_id).await?;
        let confirmed = self.store.confirmed_count(booking.bus_id).await?;
        Ok(BookingResponse::new(
            booking,
            StudentResponse::from(student),
            BusResponse::from_bus(&bus, confirmed),
        ))
    }

    /// Resolves `bus_id` and checks capacity, trip type and stop, recording
    /// problems in `errors`.
    async fn validate_bus(
        &self,
        request: &CreateBookingRequest,
        errors: &mut FieldErrors,
    ) -> Result<Option<Bus>, ServiceError> {
        if request.bus_id.trim().is_empty() {
            errors.add("bus_id", REQUIRED);
            return Ok(None);
        }
        let bus = match parse_id(&request.bus_id) {
            Ok(id) => self.store.find_bus(id).await?,
            Err(_) => None,
        };
        let Some(bus) = bus else {
            errors.add("bus_id", "Bus not found");
            return Ok(None);
        };

        let confirmed = match bus.id {
            Some(id) => self.store.confirmed_count(id).await?,
            None => 0,
        };
        if bus.is_full(confirmed) {
            errors.add("bus_id", BUS_FULL);
        }
        if !bus.trip_types.contains(&request.trip_type) {
            errors.add(
                "trip_type",
                format!("This bus does not offer {} trips", request.trip_type),
            );
        }
        if let Some(stop_id) = request.selected_stop_id {
            if bus.active_stop(stop_id).is_none() {
                errors.add("selected_stop_id", "Selected stop is not available on this bus");
            }
        }
        Ok(Some(bus))
    }

    pub async fn create(
        &self,
        student: &Student,
        request: CreateBookingRequest,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CreateBookingResponse, ServiceError> {
        let student_id = Self::student_id(student)?;
        let mut errors = FieldErrors::new();

        let trip = validate_trip(&request, today, &mut errors);
        let bus = self.validate_bus(&request, &mut errors).await?;
        if self.store.find_booking_for_student(student_id).await?.is_some() {
            errors.add(FieldErrors::NON_FIELD, ALREADY_BOOKED);
        }

        let (trip, bus, bus_id) = match (trip, bus) {
            (Some(trip), Some(bus)) if errors.is_empty() => match bus.id {
                Some(id) => (trip, bus, id),
                None => return Err(ServiceError::Internal("stored bus has no id".into())),
            },
            _ => {
                info!("Rejected booking for {}: {:?}", student.email, errors);
                return Err(ServiceError::Validation(errors));
            }
        };

        let mut booking = Booking {
            id: None,
            student_id,
            bus_id,
            booking_date: now,
            trip_date: trip.trip_date,
            departure_time: trip.departure_time,
            return_time: trip.return_time,
            trip_type: request.trip_type,
            from_location: non_blank(&request.from_location, &bus.from_location),
            to_location: non_blank(&request.to_location, &bus.to_location),
            selected_stop_id: request.selected_stop_id,
            status: BookingStatus::Pending,
            otp: None,
        };

        if self.settings.require_otp {
            let challenge = OtpChallenge::issue(now, self.settings.otp_ttl);
            booking.otp = Some(challenge.clone());
            let booking = self.insert(booking).await?;

            let email = mail::otp_email(student, &booking, &bus, &challenge);
            if let Err(e) = self.mailer.send(email).await {
                error!("OTP email to {} failed: {}", student.email, e);
                self.store.delete_booking_for_student(student_id).await?;
                return Err(e.into());
            }

            info!("Pending booking created for {} on {}", student.email, bus.bus_no);
            Ok(CreateBookingResponse {
                success: true,
                otp_sent: true,
                pending_booking_id: booking.id.map(|id| id.to_hex()),
                booking: None,
                message: Some("OTP sent to your email. Please verify to confirm booking.".into()),
            })
        } else {
            let inserted = self.insert(booking).await?;
            let booking_id = inserted
                .id
                .ok_or_else(|| ServiceError::Internal("stored booking has no id".into()))?;
            // the seat is only taken by the conditional confirm
            let booking = match self.store.confirm_booking(booking_id, bus.capacity).await? {
                Confirmation::Confirmed(booking) => booking,
                Confirmation::BusFull => {
                    self.store.delete_booking_for_student(student_id).await?;
                    info!("Bus {} filled while booking for {}", bus.bus_no, student.email);
                    return Err(ServiceError::Validation(FieldErrors::single("bus_id", BUS_FULL)));
                }
                Confirmation::NotPending => {
                    return Err(ServiceError::NotFound("No active booking found".into()))
                }
            };
            self.notify(mail::confirmation_email(student, &booking, &bus)).await;

            info!("Booking confirmed for {} on {}", student.email, bus.bus_no);
            Ok(CreateBookingResponse {
                success: true,
                otp_sent: false,
                pending_booking_id: None,
                booking: Some(self.respond(&booking, student).await?),
                message: Some("Booking confirmed! Check your email for details.".into()),
            })
        }
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, ServiceError> {
        match self.store.insert_booking(booking).await {
            Ok(booking) => Ok(booking),
            Err(StoreError::DuplicateBooking) => Err(ServiceError::Validation(FieldErrors::single(
                FieldErrors::NON_FIELD,
                ALREADY_BOOKED,
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delivery for notices whose failure must not undo the action.
    async fn notify(&self, email: mail::Email) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            warn!("Notification to {} failed: {}", to, e);
        }
    }

    pub async fn current(&self, student: &Student) -> Result<CurrentBookingResponse, ServiceError> {
        let student_id = Self::student_id(student)?;
        let booking = match self.store.find_booking_for_student(student_id).await? {
            Some(booking) => Some(self.respond(&booking, student).await?),
            None => None,
        };
        Ok(CurrentBookingResponse { booking })
    }

    async fn pending_booking(
        &self,
        student: &Student,
        raw_id: &str,
    ) -> Result<(ObjectId, Booking), ServiceError> {
        let not_found = || ServiceError::NotFound(NO_PENDING.into());
        let booking_id = parse_id(raw_id).map_err(|_| not_found())?;
        let booking = self
            .store
            .find_booking_for_student(Self::student_id(student)?)
            .await?
            .filter(|b| b.id == Some(booking_id) && b.is_pending())
            .ok_or_else(not_found)?;
        Ok((booking_id, booking))
    }

    fn reject_otp(student: &Student, e: OtpError) -> ServiceError {
        info!("OTP rejected for {}: {}", student.email, e);
        ServiceError::Validation(FieldErrors::single("otp", e.to_string()))
    }

    /// Every call spends one attempt before the code is compared, so no more
    /// than `otp_max_attempts` guesses are ever checked against a code.
    pub async fn verify_otp(
        &self,
        student: &Student,
        request: VerifyOtpRequest,
        now: DateTime<Utc>,
    ) -> Result<VerifyOtpResponse, ServiceError> {
        let (booking_id, _) = self.pending_booking(student, &request.pending_booking_id).await?;
        if request.otp.trim().is_empty() {
            return Err(ServiceError::Validation(FieldErrors::single("otp", REQUIRED)));
        }

        let max_attempts = self.settings.otp_max_attempts;
        let Some(booking) = self.store.claim_otp_attempt(booking_id, max_attempts).await? else {
            // confirmed or cancelled in the meantime, or out of attempts
            self.pending_booking(student, &request.pending_booking_id).await?;
            return Err(Self::reject_otp(student, OtpError::TooManyAttempts));
        };
        let Some(challenge) = booking.otp.as_ref() else {
            return Err(ServiceError::Internal("pending booking has no OTP".into()));
        };
        challenge
            .check(&request.otp, now, max_attempts)
            .map_err(|e| Self::reject_otp(student, e))?;

        let bus = self.load_bus(booking.bus_id).await?;
        let booking = match self.store.confirm_booking(booking_id, bus.capacity).await? {
            Confirmation::Confirmed(booking) => booking,
            Confirmation::BusFull => {
                info!("Bus {} filled before {} verified", bus.bus_no, student.email);
                return Err(ServiceError::Validation(FieldErrors::single("bus_id", BUS_FULL)));
            }
            Confirmation::NotPending => return Err(ServiceError::NotFound(NO_PENDING.into())),
        };
        self.notify(mail::confirmation_email(student, &booking, &bus)).await;

        info!("Booking confirmed for {} on {}", student.email, bus.bus_no);
        Ok(VerifyOtpResponse {
            success: true,
            message: Some("Booking confirmed!".into()),
            booking: self.respond(&booking, student).await?,
        })
    }

    pub async fn resend_otp(
        &self,
        student: &Student,
        request: ResendOtpRequest,
        now: DateTime<Utc>,
    ) -> Result<ActionResponse, ServiceError> {
        let (booking_id, booking) = self.pending_booking(student, &request.booking_id).await?;
        let bus = self.load_bus(booking.bus_id).await?;

        let challenge = OtpChallenge::issue(now, self.settings.otp_ttl);
        let booking = self
            .store
            .reissue_otp(booking_id, &challenge)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NO_PENDING.into()))?;
        self.mailer
            .send(mail::otp_email(student, &booking, &bus, &challenge))
            .await?;

        info!("OTP re-issued for {}", student.email);
        Ok(ActionResponse::ok("A new OTP has been sent to your email."))
    }

    pub async fn cancel(&self, student: &Student) -> Result<ActionResponse, ServiceError> {
        let removed = self
            .store
            .delete_booking_for_student(Self::student_id(student)?)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No active booking found".into()))?;

        if removed.status == BookingStatus::Confirmed {
            match self.store.find_bus(removed.bus_id).await? {
                Some(bus) => self.notify(mail::cancellation_email(student, &removed, &bus)).await,
                None => warn!("Cancelled booking referenced missing bus {}", removed.bus_id),
            }
        }

        info!("Booking cancelled for {}", student.email);
        Ok(ActionResponse::ok("Booking cancelled successfully"))
    }
}

fn non_blank(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}
