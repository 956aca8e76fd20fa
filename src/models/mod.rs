pub mod auth;
pub mod booking;
pub mod bus;
pub mod report;
pub mod time;
pub mod user;

// Re-export all the models that are used in other modules
pub use auth::{ActionResponse, LoginRequest, LoginResponse};
pub use booking::{
    Booking, BookingResponse, BookingStatus, CreateBookingRequest, CreateBookingResponse,
    CurrentBookingResponse, ResendOtpRequest, VerifyOtpRequest, VerifyOtpResponse,
};
pub use bus::{Bus, BusResponse, Stop, TripType};
pub use report::{BusManifest, ManifestRow, QuickStats, ReportQuery, Utilization};
pub use user::{Student, StudentResponse};
