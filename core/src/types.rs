//! Domain types for the seat checkout core.
//!
//! Identifiers, money, seats, tickets and checkout sessions. Everything here is
//! plain data: the state machine rules live in the stores (compare-and-swap) and
//! in the managers of the `ticketing` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Error returned when an identifier or enum value cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Declares a string-backed identifier.
///
/// `new()`/`From` do not validate (trusted, application-controlled input);
/// `FromStr` rejects empty and whitespace-only values and is what request
/// parsing goes through.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from trusted input.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseError::new($kind, s));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an event in the external catalog.
    EventId,
    "event id"
);

string_id!(
    /// A shopper: the authenticated user or anonymous session that holds or owns seats.
    ShopperId,
    "shopper id"
);

string_id!(
    /// Checkout session identifier issued by the payment provider.
    ///
    /// Doubles as the idempotency key for reconciliation.
    SessionId,
    "session id"
);

string_id!(
    /// Payment identifier (payment intent) reported by the provider after capture.
    PaymentId,
    "payment id"
);

/// Unique identifier for a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseError::new("ticket id", s))
    }
}

/// Seat number, unique within an event showtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatNo(pub u32);

impl SeatNo {
    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SeatNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in minor units (cents) to avoid floating-point errors.
///
/// The currency is carried by the checkout session; a single checkout never
/// mixes currencies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Converts a decimal amount (e.g. `50.00`) to cents, rounding to the
    /// nearest cent.
    ///
    /// Returns `None` for negative, non-finite or out-of-range amounts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount as a decimal number of major units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Sums amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Seats
// ============================================================================

/// Seat pricing category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeatCategory {
    /// Category A (front)
    A,
    /// Category B
    B,
    /// Category C
    C,
}

impl SeatCategory {
    /// Database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for SeatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            _ => Err(ParseError::new("seat category", s)),
        }
    }
}

/// Inventory status of a seat. A seat is in exactly one status at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    /// Free for anyone to select
    Available,
    /// Selected by a shopper, time-bounded
    Held,
    /// Locked for an in-flight checkout, time-bounded
    Reserved,
    /// Paid for; the holder is the ticket owner
    Sold,
    /// Owner put the ticket back on sale
    ResaleListed,
    /// A buyer is checking out a resale listing, time-bounded
    ReservedForResale,
}

impl SeatStatus {
    /// Database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Held => "held",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
            Self::ResaleListed => "resale_listed",
            Self::ReservedForResale => "reserved_for_resale",
        }
    }

    /// The status shown to shoppers browsing the seat map.
    ///
    /// A buyer's resale reservation is reported as plain `reserved`.
    #[must_use]
    pub const fn public(&self) -> Self {
        match self {
            Self::ReservedForResale => Self::Reserved,
            other => *other,
        }
    }

    /// Whether the status carries an expiring hold.
    #[must_use]
    pub const fn is_hold(&self) -> bool {
        matches!(self, Self::Held | Self::Reserved | Self::ReservedForResale)
    }

    /// The status a lapsed hold falls back to.
    #[must_use]
    pub const fn on_expiry(&self) -> Option<Self> {
        match self {
            Self::Held | Self::Reserved => Some(Self::Available),
            Self::ReservedForResale => Some(Self::ResaleListed),
            _ => None,
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "held" => Ok(Self::Held),
            "reserved" => Ok(Self::Reserved),
            "sold" => Ok(Self::Sold),
            "resale_listed" => Ok(Self::ResaleListed),
            "reserved_for_resale" => Ok(Self::ReservedForResale),
            _ => Err(ParseError::new("seat status", s)),
        }
    }
}

/// An event at a specific date and time. One seat map exists per showtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Showtime {
    /// Event
    pub event_id: EventId,
    /// Date and time of this showing
    pub event_datetime: DateTime<Utc>,
}

impl Showtime {
    /// Creates a new `Showtime`
    #[must_use]
    pub const fn new(event_id: EventId, event_datetime: DateTime<Utc>) -> Self {
        Self {
            event_id,
            event_datetime,
        }
    }

    /// Key of a seat within this showtime.
    #[must_use]
    pub fn seat(&self, seat_no: SeatNo) -> SeatKey {
        SeatKey::new(self.event_id.clone(), self.event_datetime, seat_no)
    }
}

impl fmt::Display for Showtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event_id, self.event_datetime.to_rfc3339())
    }
}

/// Identity of a seat: `(eventID, eventDateTime, seatNo)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatKey {
    /// Event
    pub event_id: EventId,
    /// Showtime
    pub event_datetime: DateTime<Utc>,
    /// Seat number
    pub seat_no: SeatNo,
}

impl SeatKey {
    /// Creates a new `SeatKey`
    #[must_use]
    pub const fn new(event_id: EventId, event_datetime: DateTime<Utc>, seat_no: SeatNo) -> Self {
        Self {
            event_id,
            event_datetime,
            seat_no,
        }
    }

    /// The showtime this seat belongs to.
    #[must_use]
    pub fn showtime(&self) -> Showtime {
        Showtime::new(self.event_id.clone(), self.event_datetime)
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}#{}",
            self.event_id,
            self.event_datetime.to_rfc3339(),
            self.seat_no
        )
    }
}

/// A sold ticket offered again by its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResaleListing {
    /// Ticket being resold
    pub ticket_id: TicketId,
    /// Current owner
    pub seller: ShopperId,
    /// Asking price
    pub price: Money,
}

/// A seat in the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Identity
    pub key: SeatKey,
    /// Pricing category
    pub category: SeatCategory,
    /// Face value
    pub price: Money,
    /// Current status
    pub status: SeatStatus,
    /// Hold owner while held/reserved, owner once sold
    pub holder: Option<ShopperId>,
    /// Expiry of the current hold
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Present while the seat is re-listed for resale
    pub listing: Option<ResaleListing>,
}

impl Seat {
    /// Creates an available seat.
    #[must_use]
    pub const fn new(key: SeatKey, category: SeatCategory, price: Money) -> Self {
        Self {
            key,
            category,
            price,
            status: SeatStatus::Available,
            holder: None,
            hold_expires_at: None,
            listing: None,
        }
    }

    /// Price a buyer pays right now: the resale price while listed, face value otherwise.
    #[must_use]
    pub fn asking_price(&self) -> Money {
        self.listing.as_ref().map_or(self.price, |listing| listing.price)
    }

    /// Whether `shopper` is the current holder.
    #[must_use]
    pub fn is_held_by(&self, shopper: &ShopperId) -> bool {
        self.holder.as_ref() == Some(shopper)
    }

    /// Whether the seat carries a hold that lapsed at or before `now`.
    #[must_use]
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_hold() && self.hold_expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Append-only audit record of a successful seat transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatTransitionRecord {
    /// Seat that moved
    pub seat: SeatKey,
    /// Previous status
    pub from: SeatStatus,
    /// New status
    pub to: SeatStatus,
    /// Holder after the transition
    pub holder: Option<ShopperId>,
    /// When the transition was applied
    pub at: DateTime<Utc>,
}

/// A time-bounded claim on one or more seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// Who holds the seats
    pub holder: ShopperId,
    /// Seats covered by the hold
    pub seats: Vec<SeatKey>,
    /// When the hold lapses
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Tickets
// ============================================================================

/// Ticket lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Paid for and owned
    Confirmed,
    /// Offered for resale
    ResaleListed,
    /// Scanned at the venue
    CheckedIn,
}

impl TicketStatus {
    /// Database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::ResaleListed => "resale_listed",
            Self::CheckedIn => "checked_in",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "resale_listed" => Ok(Self::ResaleListed),
            "checked_in" => Ok(Self::CheckedIn),
            _ => Err(ParseError::new("ticket status", s)),
        }
    }
}

/// Durable proof of purchase. One ticket per sold seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub ticket_id: TicketId,
    /// Current owner
    pub owner_id: ShopperId,
    /// Event
    pub event_id: EventId,
    /// Event display name at purchase time
    pub event_name: String,
    /// Showtime
    pub event_datetime: DateTime<Utc>,
    /// Seat number
    pub seat_no: SeatNo,
    /// Seat category
    pub seat_category: SeatCategory,
    /// Price paid at the original sale
    pub price: Money,
    /// Asking price while listed for resale
    pub resale_price: Option<Money>,
    /// Provider payment that produced the current ownership
    pub payment_id: PaymentId,
    /// Checkout session that produced the current ownership
    pub session_id: SessionId,
    /// Whether the ticket has been scanned
    pub is_checked_in: bool,
    /// Lifecycle status
    pub status: TicketStatus,
    /// When the ticket was issued
    pub purchased_at: DateTime<Utc>,
}

impl Ticket {
    /// Key of the seat this ticket is for.
    #[must_use]
    pub fn seat_key(&self) -> SeatKey {
        SeatKey::new(self.event_id.clone(), self.event_datetime, self.seat_no)
    }
}

// ============================================================================
// Checkout sessions
// ============================================================================

/// Attendee details captured per seat at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Full name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone in international format (`+6591234567`)
    pub phone: String,
}

/// One priced seat in a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    /// Seat number
    pub seat_no: SeatNo,
    /// Seat category
    pub category: SeatCategory,
    /// Price charged for this seat
    pub price: Money,
}

/// What a checkout is buying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutKind {
    /// Seats from the primary inventory
    Primary,
    /// A resale listing
    Resale {
        /// Ticket changing hands
        ticket_id: TicketId,
        /// Owner being paid out
        seller: ShopperId,
    },
}

/// Reconciliation status of a checkout session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// Waiting for the shopper to pay
    Pending,
    /// Payment confirmed and tickets issued
    Verified,
    /// Payment captured but the seats could not be committed
    Failed,
}

impl CheckoutStatus {
    /// Database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for CheckoutStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseError::new("checkout status", s)),
        }
    }
}

/// A payment-provider checkout session and the seats it pays for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider-issued id (idempotency key)
    pub session_id: SessionId,
    /// Shopper paying
    pub holder: ShopperId,
    /// Event
    pub event_id: EventId,
    /// Showtime
    pub event_datetime: DateTime<Utc>,
    /// Event display name
    pub event_name: String,
    /// Priced seats
    pub lines: Vec<CheckoutLine>,
    /// Attendee per seat, same order as `lines`
    pub attendees: Vec<Attendee>,
    /// Total charged
    pub amount: Money,
    /// ISO currency code, lowercase (`sgd`)
    pub currency: String,
    /// Provider redirect on success
    pub success_url: String,
    /// Provider redirect on cancel
    pub cancel_url: String,
    /// Hosted checkout page
    pub checkout_url: String,
    /// Primary sale or resale
    pub kind: CheckoutKind,
    /// Reconciliation status
    pub status: CheckoutStatus,
    /// Set once verified
    pub payment_id: Option<PaymentId>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Showtime the session buys seats for.
    #[must_use]
    pub fn showtime(&self) -> Showtime {
        Showtime::new(self.event_id.clone(), self.event_datetime)
    }

    /// Keys of every seat in the session.
    #[must_use]
    pub fn seat_keys(&self) -> Vec<SeatKey> {
        let showtime = self.showtime();
        self.lines.iter().map(|line| showtime.seat(line.seat_no)).collect()
    }
}
