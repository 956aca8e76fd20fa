//! Student-facing client: typed API calls, the remembered session, the
//! booking flow and the text screens built on them.

pub mod api;
pub mod error;
pub mod flow;
pub mod pages;
pub mod render;
pub mod router;
pub mod session;

pub use api::{ApiClient, BookingOutcome, DEFAULT_API_BASE};
pub use error::ApiError;
pub use flow::{BookingFlow, BookingState, FlowError, TripSelection};
pub use router::{resolve, Resolution, Route};
pub use session::{AuthContext, AuthState, SessionFile};
