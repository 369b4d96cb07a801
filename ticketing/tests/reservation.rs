//! Seat selection integration tests.
//!
//! Holds, the per-showtime limit, shared expiry and release of lapsed holds,
//! driven through [`ticketing::Ticketing`] over the in-memory store.

#![allow(clippy::unwrap_used)]

mod common;

use boxoffice_core::types::{SeatStatus, Showtime};
use boxoffice_testing::fixtures::{shopper, test_showtime};
use chrono::Duration;
use common::{TestApp, seat};
use ticketing::{SelectOutcome, TicketingError};

#[tokio::test]
async fn test_held_seat_is_unavailable_to_others() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[3]).await;

    let err = app
        .ticketing
        .reservations
        .select_seat(&shopper("bob"), &seat(3))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TicketingError::SeatUnavailable {
            seat: seat(3),
            status: SeatStatus::Held,
        }
    );
    assert_eq!(app.store.seat(&seat(3)).unwrap().holder, Some(shopper("ann")));
}

#[tokio::test]
async fn test_seats_share_first_expiry() {
    let app = TestApp::new().await;
    let reservations = &app.ticketing.reservations;

    let SelectOutcome::Selected { expires_at: first } =
        reservations.select_seat(&shopper("ann"), &seat(1)).await.unwrap()
    else {
        unreachable!("first select holds the seat");
    };
    app.clock.advance(Duration::minutes(4));
    let SelectOutcome::Selected { expires_at: second } =
        reservations.select_seat(&shopper("ann"), &seat(2)).await.unwrap()
    else {
        unreachable!("second select holds the seat");
    };

    assert_eq!(first, second);
    let selection = reservations.selection(&shopper("ann"), &test_showtime()).await.unwrap();
    assert_eq!(selection.seats.len(), 2);
    assert_eq!(selection.expires_at, Some(first));
    assert!(selection.created_at.unwrap() < first);
}

#[tokio::test]
async fn test_selecting_held_seat_again_releases_it() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[5]).await;

    let outcome = app
        .ticketing
        .reservations
        .select_seat(&shopper("ann"), &seat(5))
        .await
        .unwrap();

    assert!(matches!(outcome, SelectOutcome::Deselected));
    let released = app.store.seat(&seat(5)).unwrap();
    assert_eq!(released.status, SeatStatus::Available);
    assert_eq!(released.holder, None);
}

#[tokio::test]
async fn test_selection_limit_per_showtime() {
    let app = TestApp::new().await;
    let limit = app.ticketing.reservations.max_selection();
    let seats: Vec<u32> = (1..=u32::try_from(limit).unwrap()).collect();
    app.hold(&shopper("ann"), &seats).await;

    let err = app
        .ticketing
        .reservations
        .select_seat(&shopper("ann"), &seat(10))
        .await
        .unwrap_err();

    assert_eq!(err, TicketingError::SelectionLimitExceeded { limit });
    assert_eq!(app.store.seat(&seat(10)).unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn test_only_holder_may_deselect() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[4]).await;

    let err = app
        .ticketing
        .reservations
        .deselect_seat(&shopper("bob"), &seat(4))
        .await
        .unwrap_err();
    assert_eq!(err, TicketingError::NotHolder { seat: seat(4) });

    app.ticketing.reservations.deselect_seat(&shopper("ann"), &seat(4)).await.unwrap();
    assert_eq!(app.store.seat(&seat(4)).unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn test_lapsed_hold_released_on_next_select() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[6]).await;

    app.clock.advance(Duration::minutes(11));
    app.ticketing
        .reservations
        .select_seat(&shopper("bob"), &seat(6))
        .await
        .unwrap();

    assert_eq!(app.store.seat(&seat(6)).unwrap().holder, Some(shopper("bob")));
    let selection = app
        .ticketing
        .reservations
        .selection(&shopper("ann"), &test_showtime())
        .await
        .unwrap();
    assert!(selection.seats.is_empty());
    assert_eq!(selection.expires_at, None);
}

#[tokio::test]
async fn test_sweep_releases_only_lapsed_holds() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[1, 2]).await;
    app.clock.advance(Duration::minutes(8));
    app.hold(&shopper("bob"), &[7]).await;
    app.clock.advance(Duration::minutes(3));

    let mut released = app.ticketing.reservations.expire_holds().await.unwrap();
    released.sort_by_key(|key| key.seat_no);

    assert_eq!(released, vec![seat(1), seat(2)]);
    assert_eq!(app.store.seat(&seat(7)).unwrap().status, SeatStatus::Held);
    assert_eq!(app.store.count_status(&test_showtime(), SeatStatus::Held), 1);
}

#[tokio::test]
async fn test_holds_are_scoped_to_showtime() {
    let app = TestApp::new().await;
    app.hold(&shopper("ann"), &[1]).await;

    let other = Showtime::new(
        test_showtime().event_id,
        test_showtime().event_datetime + Duration::days(1),
    );
    let selection = app
        .ticketing
        .reservations
        .selection(&shopper("ann"), &other)
        .await
        .unwrap();

    assert!(selection.seats.is_empty());
}
