//! Ticketing error taxonomy and its HTTP mapping.
//!
//! Every manager returns [`TicketingError`]. Store failures are folded in via
//! `From<StoreError>`; the web boundary converts to [`AppError`] with a stable
//! machine code per variant.

use boxoffice_core::payment::PaymentError;
use boxoffice_core::store::StoreError;
use boxoffice_core::types::{SeatKey, SeatStatus, SessionId, TicketId};
use boxoffice_web::AppError;
use thiserror::Error;

/// Errors returned by the ticketing managers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketingError {
    /// Seat is taken by someone else (or not on sale).
    #[error("Seat {seat} is not available (currently {status})")]
    SeatUnavailable {
        /// Seat requested
        seat: SeatKey,
        /// Public status of the seat
        status: SeatStatus,
    },

    /// Shopper already holds the maximum number of seats for the showtime.
    #[error("Selection limit of {limit} seats reached")]
    SelectionLimitExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Seat is not held by the caller.
    #[error("Seat {seat} is not held by you")]
    NotHolder {
        /// Seat in question
        seat: SeatKey,
    },

    /// Attendee details do not match the seats, or are invalid.
    #[error("Attendee details rejected: {0}")]
    AttendeeMismatch(String),

    /// The payment provider could not create a checkout session.
    #[error("Could not start checkout, please try again: {0}")]
    CheckoutCreateFailed(PaymentError),

    /// The provider has not confirmed payment for the session.
    #[error("Payment for session {session_id} is not confirmed")]
    PaymentNotConfirmed {
        /// Session being verified
        session_id: SessionId,
    },

    /// Ticket belongs to somebody else.
    #[error("Ticket {0} is not owned by you")]
    NotOwner(TicketId),

    /// Ticket has already been scanned.
    #[error("Ticket {0} has already been checked in")]
    AlreadyCheckedIn(TicketId),

    /// Ticket is already listed for resale.
    #[error("Ticket {0} is listed for resale")]
    AlreadyListed(TicketId),

    /// Concurrent modification; the caller may retry.
    #[error("Conflicting update: {0}")]
    Conflict(String),

    /// No such seat.
    #[error("Seat not found: {0}")]
    SeatNotFound(SeatKey),

    /// No such ticket.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// No such checkout session.
    #[error("Checkout session not found: {0}")]
    SessionNotFound(SessionId),

    /// Resale price is negative, zero or not a number.
    #[error("Invalid resale price: {0}")]
    InvalidResalePrice(String),

    /// The durable store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TicketingError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SeatUnavailable { .. } => "SEAT_UNAVAILABLE",
            Self::SelectionLimitExceeded { .. } => "SELECTION_LIMIT_EXCEEDED",
            Self::NotHolder { .. } => "NOT_HOLDER",
            Self::AttendeeMismatch(_) => "ATTENDEE_MISMATCH",
            Self::CheckoutCreateFailed(_) => "CHECKOUT_CREATE_FAILED",
            Self::PaymentNotConfirmed { .. } => "PAYMENT_NOT_CONFIRMED",
            Self::NotOwner(_) => "NOT_OWNER",
            Self::AlreadyCheckedIn(_) => "ALREADY_CHECKED_IN",
            Self::AlreadyListed(_) => "ALREADY_LISTED",
            Self::Conflict(_) => "CONFLICT",
            Self::SeatNotFound(_) => "SEAT_NOT_FOUND",
            Self::TicketNotFound(_) => "TICKET_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidResalePrice(_) => "INVALID_RESALE_PRICE",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the same request may succeed if repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SeatUnavailable { .. }
                | Self::Conflict(_)
                | Self::CheckoutCreateFailed(_)
                | Self::PaymentNotConfirmed { .. }
                | Self::StoreUnavailable(_)
        )
    }
}

impl From<StoreError> for TicketingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. }
            | StoreError::TicketConflict { .. }
            | StoreError::Duplicate(_)
            | StoreError::AlreadyTicketed { .. } => Self::Conflict(err.to_string()),
            StoreError::SeatNotFound(seat) => Self::SeatNotFound(seat),
            StoreError::TicketNotFound(ticket_id) => Self::TicketNotFound(ticket_id),
            StoreError::SessionNotFound(session_id) => Self::SessionNotFound(session_id),
            StoreError::DatabaseError(_) | StoreError::SerializationError(_) => {
                Self::StoreUnavailable(err.to_string())
            }
        }
    }
}

impl From<TicketingError> for AppError {
    fn from(err: TicketingError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let app_error = match &err {
            TicketingError::SeatUnavailable { .. }
            | TicketingError::Conflict(_)
            | TicketingError::AlreadyCheckedIn(_)
            | TicketingError::AlreadyListed(_) => Self::conflict(message),
            TicketingError::SelectionLimitExceeded { .. }
            | TicketingError::AttendeeMismatch(_)
            | TicketingError::InvalidResalePrice(_) => Self::validation(message),
            TicketingError::NotHolder { .. } | TicketingError::NotOwner(_) => Self::forbidden(message),
            TicketingError::SeatNotFound(seat) => Self::not_found("Seat", seat),
            TicketingError::TicketNotFound(ticket_id) => Self::not_found("Ticket", ticket_id),
            TicketingError::SessionNotFound(session_id) => Self::not_found("Checkout session", session_id),
            TicketingError::PaymentNotConfirmed { .. } => Self::payment_required(message),
            TicketingError::CheckoutCreateFailed(_) => {
                Self::bad_gateway(message).with_source(anyhow::Error::new(err.clone()))
            }
            TicketingError::StoreUnavailable(_) => {
                Self::unavailable("Seat store unavailable, please retry")
                    .with_source(anyhow::Error::new(err.clone()))
            }
        };
        app_error.with_code(code)
    }
}

/// Result alias for manager operations.
pub type TicketingResult<T> = Result<T, TicketingError>;
