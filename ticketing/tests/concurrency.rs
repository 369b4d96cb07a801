//! Concurrency integration tests.
//!
//! Races between shoppers for the same seats and between duplicate payment
//! verifications. Every test runs on a multi-threaded runtime so tasks really
//! interleave at the store.
//!
//! Run with: `cargo test --test concurrency`

#![allow(clippy::unwrap_used)]

mod common;

use boxoffice_core::types::{SeatStatus, TicketId};
use boxoffice_testing::fixtures::{shopper, test_showtime};
use common::{TestApp, order, seat};
use std::sync::Arc;
use tokio::task::JoinSet;
use ticketing::TicketingError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_winner_per_seat() {
    let app = Arc::new(TestApp::new().await);
    let mut racers = JoinSet::new();
    for n in 0..32 {
        let app = Arc::clone(&app);
        racers.spawn(async move {
            let who = shopper(&format!("racer-{n}"));
            let outcome = app.ticketing.reservations.select_seat(&who, &seat(1)).await;
            (who, outcome)
        });
    }

    let mut winners = Vec::new();
    while let Some(joined) = racers.join_next().await {
        let (who, outcome) = joined.unwrap();
        match outcome {
            Ok(_) => winners.push(who),
            Err(err) => assert!(matches!(err, TicketingError::SeatUnavailable { .. })),
        }
    }

    assert_eq!(winners.len(), 1);
    let held = app.store.seat(&seat(1)).unwrap();
    assert_eq!(held.status, SeatStatus::Held);
    assert_eq!(held.holder.as_ref(), winners.first());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_orders_never_share_a_seat() {
    let app = Arc::new(TestApp::new().await);
    let mut racers = JoinSet::new();
    for n in 0..8 {
        let app = Arc::clone(&app);
        racers.spawn(async move {
            let who = shopper(&format!("buyer-{n}"));
            let mut held = Vec::new();
            for no in [2, 3, 4] {
                if app.ticketing.reservations.select_seat(&who, &seat(no)).await.is_ok() {
                    held.push(no);
                }
            }
            if held.is_empty() {
                return 0;
            }
            let Ok(started) = app.ticketing.checkout.start_checkout(&who, order(&held)).await else {
                return 0;
            };
            app.provider.mark_paid(&started.session_id);
            app.ticketing
                .checkout
                .verify_and_finalize(&started.session_id)
                .await
                .map_or(0, |tickets| tickets.len())
        });
    }

    let mut issued = 0;
    while let Some(joined) = racers.join_next().await {
        issued += joined.unwrap();
    }

    assert_eq!(issued, 3);
    assert_eq!(app.store.all_tickets().len(), 3);
    assert_eq!(app.store.count_status(&test_showtime(), SeatStatus::Sold), 3);
    let mut seats: Vec<_> = app.store.all_tickets().into_iter().map(|t| t.seat_no).collect();
    seats.sort();
    seats.dedup();
    assert_eq!(seats.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verify_issues_tickets_once() {
    let app = Arc::new(TestApp::new().await);
    let ann = shopper("ann");
    app.hold(&ann, &[5, 6]).await;
    let started = app.ticketing.checkout.start_checkout(&ann, order(&[5, 6])).await.unwrap();
    app.provider.mark_paid(&started.session_id);

    let mut verifiers = JoinSet::new();
    for _ in 0..8 {
        let app = Arc::clone(&app);
        let session_id = started.session_id.clone();
        verifiers.spawn(async move { app.ticketing.checkout.verify_and_finalize(&session_id).await });
    }

    let mut seen: Option<Vec<TicketId>> = None;
    while let Some(joined) = verifiers.join_next().await {
        let mut ids: Vec<TicketId> = joined
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|ticket| ticket.ticket_id)
            .collect();
        ids.sort_by_key(|id| *id.as_uuid());
        match &seen {
            Some(expected) => assert_eq!(&ids, expected),
            None => seen = Some(ids),
        }
    }

    assert_eq!(app.store.all_tickets().len(), 2);
    assert_eq!(app.publisher.records().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resale_reservations() {
    let app = Arc::new(TestApp::new().await);
    let (_, tickets) = app.buy(&shopper("seller"), &[8]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing
        .resale
        .list_for_resale(&shopper("seller"), ticket_id, 30.0)
        .await
        .unwrap();

    let mut racers = JoinSet::new();
    for n in 0..16 {
        let app = Arc::clone(&app);
        racers.spawn(async move {
            app.ticketing
                .resale
                .reserve_resale(&shopper(&format!("fan-{n}")), ticket_id)
                .await
                .is_ok()
        });
    }

    let mut reserved = 0;
    while let Some(joined) = racers.join_next().await {
        if joined.unwrap() {
            reserved += 1;
        }
    }

    assert_eq!(reserved, 1);
    assert_eq!(app.store.seat(&seat(8)).unwrap().status, SeatStatus::ReservedForResale);
}
