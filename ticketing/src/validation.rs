//! Input checks for checkout and resale requests.

use crate::error::{TicketingError, TicketingResult};
use boxoffice_core::types::{Attendee, Money};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // Literal pattern
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

#[allow(clippy::expect_used)] // Literal pattern
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{1,3}\d{7,12}$").expect("valid phone pattern"));

/// Check that there is one valid attendee per seat.
///
/// # Errors
///
/// Returns [`TicketingError::AttendeeMismatch`] for an empty order, a count
/// mismatch, or the first attendee with a blank name, bad email or bad phone.
pub fn validate_attendees(seat_count: usize, attendees: &[Attendee]) -> TicketingResult<()> {
    if seat_count == 0 {
        return Err(TicketingError::AttendeeMismatch("no seats selected".to_string()));
    }
    if attendees.len() != seat_count {
        return Err(TicketingError::AttendeeMismatch(format!(
            "{} attendees for {seat_count} seats",
            attendees.len()
        )));
    }

    for (index, attendee) in attendees.iter().enumerate() {
        let position = index + 1;
        if attendee.name.trim().is_empty() {
            return Err(TicketingError::AttendeeMismatch(format!(
                "attendee {position} has no name"
            )));
        }
        if !EMAIL.is_match(attendee.email.trim()) {
            return Err(TicketingError::AttendeeMismatch(format!(
                "attendee {position} has an invalid email"
            )));
        }
        if !PHONE.is_match(attendee.phone.trim()) {
            return Err(TicketingError::AttendeeMismatch(format!(
                "attendee {position} has an invalid phone number"
            )));
        }
    }
    Ok(())
}

/// Convert a decimal resale price into money.
///
/// # Errors
///
/// Returns [`TicketingError::InvalidResalePrice`] for negative, zero or
/// non-finite prices.
pub fn resale_price(amount: f64) -> TicketingResult<Money> {
    Money::from_decimal(amount)
        .filter(|price| !price.is_zero())
        .ok_or_else(|| TicketingError::InvalidResalePrice(amount.to_string()))
}
