//! Row decoding and column conversions.

use boxoffice_core::store::StoreError;
use boxoffice_core::types::{
    Attendee, CheckoutKind, CheckoutLine, CheckoutSession, EventId, Money, PaymentId,
    ResaleListing, Seat, SeatKey, SeatNo, SeatTransitionRecord, SessionId, ShopperId, Ticket,
    TicketId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! seat_columns {
    () => {
        "event_id, event_datetime, seat_no, category, price_cents, status, holder_id, \
         hold_expires_at, listing_ticket_id, listing_seller_id, listing_price_cents"
    };
}

macro_rules! ticket_columns {
    () => {
        "ticket_id, owner_id, event_id, event_name, event_datetime, seat_no, seat_category, \
         price_cents, resale_price_cents, payment_id, session_id, is_checked_in, status, \
         purchased_at"
    };
}

macro_rules! session_columns {
    () => {
        "session_id, holder_id, event_id, event_datetime, event_name, lines, attendees, \
         amount_cents, currency, success_url, cancel_url, checkout_url, kind, status, \
         payment_id, created_at"
    };
}

pub(crate) use {seat_columns, session_columns, ticket_columns};

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::SerializationError(format!("column {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::SerializationError(e.to_string()))
}

pub(crate) fn cents_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::SerializationError(format!("amount out of range: {money}")))
}

fn money(row: &PgRow, name: &str) -> Result<Money, StoreError> {
    let cents: i64 = column(row, name)?;
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::SerializationError(format!("negative amount in {name}")))
}

fn optional_money(row: &PgRow, name: &str) -> Result<Option<Money>, StoreError> {
    let cents: Option<i64> = column(row, name)?;
    cents
        .map(|cents| {
            u64::try_from(cents)
                .map(Money::from_cents)
                .map_err(|_| StoreError::SerializationError(format!("negative amount in {name}")))
        })
        .transpose()
}

pub(crate) fn seat_no_to_db(seat_no: SeatNo) -> Result<i32, StoreError> {
    i32::try_from(seat_no.value())
        .map_err(|_| StoreError::SerializationError(format!("seat number out of range: {seat_no}")))
}

fn seat_no(row: &PgRow) -> Result<SeatNo, StoreError> {
    let raw: i32 = column(row, "seat_no")?;
    u32::try_from(raw)
        .map(SeatNo)
        .map_err(|_| StoreError::SerializationError(format!("negative seat number {raw}")))
}

pub(crate) fn seat_key(row: &PgRow) -> Result<SeatKey, StoreError> {
    let event_id: String = column(row, "event_id")?;
    let event_datetime: DateTime<Utc> = column(row, "event_datetime")?;
    Ok(SeatKey::new(EventId::new(event_id), event_datetime, seat_no(row)?))
}

pub(crate) fn seat(row: &PgRow) -> Result<Seat, StoreError> {
    let holder: Option<String> = column(row, "holder_id")?;
    let listing_ticket: Option<Uuid> = column(row, "listing_ticket_id")?;
    let listing_seller: Option<String> = column(row, "listing_seller_id")?;
    let listing_price = optional_money(row, "listing_price_cents")?;

    let listing = match (listing_ticket, listing_seller, listing_price) {
        (Some(ticket_id), Some(seller), Some(price)) => Some(ResaleListing {
            ticket_id: TicketId::from_uuid(ticket_id),
            seller: ShopperId::new(seller),
            price,
        }),
        _ => None,
    };

    Ok(Seat {
        key: seat_key(row)?,
        category: parsed(row, "category")?,
        price: money(row, "price_cents")?,
        status: parsed(row, "status")?,
        holder: holder.map(ShopperId::new),
        hold_expires_at: column(row, "hold_expires_at")?,
        listing,
    })
}

pub(crate) fn transition_record(row: &PgRow) -> Result<SeatTransitionRecord, StoreError> {
    let holder: Option<String> = column(row, "holder_id")?;
    Ok(SeatTransitionRecord {
        seat: seat_key(row)?,
        from: parsed(row, "from_status")?,
        to: parsed(row, "to_status")?,
        holder: holder.map(ShopperId::new),
        at: column(row, "at")?,
    })
}

pub(crate) fn ticket(row: &PgRow) -> Result<Ticket, StoreError> {
    let ticket_id: Uuid = column(row, "ticket_id")?;
    let owner: String = column(row, "owner_id")?;
    let event_id: String = column(row, "event_id")?;
    let payment_id: String = column(row, "payment_id")?;
    let session_id: String = column(row, "session_id")?;

    Ok(Ticket {
        ticket_id: TicketId::from_uuid(ticket_id),
        owner_id: ShopperId::new(owner),
        event_id: EventId::new(event_id),
        event_name: column(row, "event_name")?,
        event_datetime: column(row, "event_datetime")?,
        seat_no: seat_no(row)?,
        seat_category: parsed(row, "seat_category")?,
        price: money(row, "price_cents")?,
        resale_price: optional_money(row, "resale_price_cents")?,
        payment_id: PaymentId::new(payment_id),
        session_id: SessionId::new(session_id),
        is_checked_in: column(row, "is_checked_in")?,
        status: parsed(row, "status")?,
        purchased_at: column(row, "purchased_at")?,
    })
}

pub(crate) fn session(row: &PgRow) -> Result<CheckoutSession, StoreError> {
    let session_id: String = column(row, "session_id")?;
    let holder: String = column(row, "holder_id")?;
    let event_id: String = column(row, "event_id")?;
    let lines: Json<Vec<CheckoutLine>> = column(row, "lines")?;
    let attendees: Json<Vec<Attendee>> = column(row, "attendees")?;
    let kind: Json<CheckoutKind> = column(row, "kind")?;
    let payment_id: Option<String> = column(row, "payment_id")?;

    Ok(CheckoutSession {
        session_id: SessionId::new(session_id),
        holder: ShopperId::new(holder),
        event_id: EventId::new(event_id),
        event_datetime: column(row, "event_datetime")?,
        event_name: column(row, "event_name")?,
        lines: lines.0,
        attendees: attendees.0,
        amount: money(row, "amount_cents")?,
        currency: column(row, "currency")?,
        success_url: column(row, "success_url")?,
        cancel_url: column(row, "cancel_url")?,
        checkout_url: column(row, "checkout_url")?,
        kind: kind.0,
        status: parsed(row, "status")?,
        payment_id: payment_id.map(PaymentId::new),
        created_at: column(row, "created_at")?,
    })
}
