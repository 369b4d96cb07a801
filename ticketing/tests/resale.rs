//! Resale integration tests: list, reserve, pay and transfer.

#![allow(clippy::unwrap_used)]

mod common;

use boxoffice_core::types::{CheckoutKind, CheckoutStatus, Money, SeatNo, SeatStatus, TicketStatus};
use boxoffice_testing::fixtures::{attendee, shopper};
use chrono::Duration;
use common::{TestApp, seat};
use ticketing::TicketingError;

#[tokio::test]
async fn test_resale_at_thirty_dollars() {
    let app = TestApp::new().await;
    let (seller, buyer) = (shopper("ann"), shopper("bob"));
    let (_, tickets) = app.buy(&seller, &[1]).await;
    let ticket_id = tickets[0].ticket_id;

    let listed = app.ticketing.resale.list_for_resale(&seller, ticket_id, 30.0).await.unwrap();
    assert_eq!(listed.status, TicketStatus::ResaleListed);
    assert_eq!(listed.resale_price, Some(Money::from_cents(3000)));
    let on_sale = app.store.seat(&seat(1)).unwrap();
    assert_eq!(on_sale.status, SeatStatus::ResaleListed);
    assert_eq!(on_sale.asking_price(), Money::from_cents(3000));

    let hold = app.ticketing.resale.reserve_resale(&buyer, ticket_id).await.unwrap();
    assert_eq!(hold.holder, buyer);
    assert_eq!(hold.seats, vec![seat(1)]);

    let started = app
        .ticketing
        .resale
        .start_resale_checkout(&buyer, ticket_id, attendee(9))
        .await
        .unwrap();
    assert_eq!(started.amount, Money::from_cents(3000));
    let request = app.provider.requests().pop().unwrap();
    assert_eq!(request.unit_amount, Money::from_cents(3000));
    assert_eq!(request.quantity, 1);
    let session = app.ticketing.checkout.session(&started.session_id).await.unwrap();
    assert_eq!(
        session.kind,
        CheckoutKind::Resale {
            ticket_id,
            seller: seller.clone(),
        }
    );

    let payment_id = app.provider.mark_paid(&started.session_id);
    let transferred = app
        .ticketing
        .resale
        .finalize_resale_purchase(&started.session_id)
        .await
        .unwrap();

    assert_eq!(transferred.ticket_id, ticket_id);
    assert_eq!(transferred.owner_id, buyer);
    assert_eq!(transferred.status, TicketStatus::Confirmed);
    assert_eq!(transferred.resale_price, None);
    assert_eq!(transferred.payment_id, payment_id);
    assert_eq!(transferred.seat_no, SeatNo(1));

    let sold = app.store.seat(&seat(1)).unwrap();
    assert_eq!(sold.status, SeatStatus::Sold);
    assert_eq!(sold.holder, Some(buyer.clone()));
    assert_eq!(sold.listing, None);

    let credits = app.ledger.records();
    assert_eq!(credits.len(), 1);
    assert_eq!(credits[0].seller, seller);
    assert_eq!(credits[0].amount, Money::from_cents(3000));
    assert_eq!(credits[0].ticket_id, ticket_id);

    assert!(app.ticketing.checkin.tickets_for_owner(&seller).await.unwrap().is_empty());
    assert_eq!(app.ticketing.checkin.tickets_for_owner(&buyer).await.unwrap().len(), 1);

    // Reloading the success page returns the same ticket and credits nobody twice
    let again = app
        .ticketing
        .resale
        .finalize_resale_purchase(&started.session_id)
        .await
        .unwrap();
    assert_eq!(again, transferred);
    assert_eq!(app.ledger.records().len(), 1);
}

#[tokio::test]
async fn test_withdrawn_listing_cannot_be_reserved() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[2]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 45.5).await.unwrap();

    let withdrawn = app.ticketing.resale.withdraw_listing(&shopper("ann"), ticket_id).await.unwrap();

    assert_eq!(withdrawn.status, TicketStatus::Confirmed);
    assert_eq!(withdrawn.resale_price, None);
    let seat = app.store.seat(&seat(2)).unwrap();
    assert_eq!(seat.status, SeatStatus::Sold);
    assert_eq!(seat.holder, Some(shopper("ann")));
    let err = app.ticketing.resale.reserve_resale(&shopper("bob"), ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::SeatUnavailable { status: SeatStatus::Sold, .. }));
}

#[tokio::test]
async fn test_reserved_listing_cannot_be_withdrawn() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[3]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 20.0).await.unwrap();
    app.ticketing.resale.reserve_resale(&shopper("bob"), ticket_id).await.unwrap();

    let err = app.ticketing.resale.withdraw_listing(&shopper("ann"), ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::SeatUnavailable { .. }));

    // Once bob's reservation lapses the seller may withdraw again
    app.clock.advance(Duration::minutes(11));
    app.ticketing.resale.withdraw_listing(&shopper("ann"), ticket_id).await.unwrap();
    assert_eq!(app.store.seat(&seat(3)).unwrap().status, SeatStatus::Sold);
}

#[tokio::test]
async fn test_checked_in_ticket_cannot_be_listed() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[4]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.checkin.check_in(ticket_id).await.unwrap();

    let err = app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 30.0).await.unwrap_err();

    assert_eq!(err, TicketingError::AlreadyCheckedIn(ticket_id));
    assert_eq!(app.store.seat(&seat(4)).unwrap().status, SeatStatus::Sold);
}

#[tokio::test]
async fn test_listed_ticket_cannot_be_checked_in() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[5]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 30.0).await.unwrap();

    let err = app.ticketing.checkin.check_in(ticket_id).await.unwrap_err();
    assert_eq!(err, TicketingError::AlreadyListed(ticket_id));

    let status = app.ticketing.checkin.status(ticket_id).await.unwrap();
    assert!(!status.is_checked_in);
}

#[tokio::test]
async fn test_check_in_only_once() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[6]).await;
    let ticket_id = tickets[0].ticket_id;

    let checked = app.ticketing.checkin.check_in(ticket_id).await.unwrap();
    assert!(checked.is_checked_in);
    assert_eq!(checked.status, TicketStatus::CheckedIn);

    let err = app.ticketing.checkin.check_in(ticket_id).await.unwrap_err();
    assert_eq!(err, TicketingError::AlreadyCheckedIn(ticket_id));
}

#[tokio::test]
async fn test_resale_paid_after_listing_withdrawn_fails() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[7]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 30.0).await.unwrap();
    app.ticketing.resale.reserve_resale(&shopper("bob"), ticket_id).await.unwrap();
    let started = app
        .ticketing
        .resale
        .start_resale_checkout(&shopper("bob"), ticket_id, attendee(2))
        .await
        .unwrap();

    app.clock.advance(Duration::minutes(11));
    app.ticketing.resale.withdraw_listing(&shopper("ann"), ticket_id).await.unwrap();
    app.provider.mark_paid(&started.session_id);

    let err = app
        .ticketing
        .resale
        .finalize_resale_purchase(&started.session_id)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    let ticket = app.ticketing.checkin.tickets_for_owner(&shopper("ann")).await.unwrap();
    assert_eq!(ticket.len(), 1);
    assert!(app.ledger.records().is_empty());
}

#[tokio::test]
async fn test_original_session_replay_after_resale() {
    let app = TestApp::new().await;
    let (seller, buyer) = (shopper("ann"), shopper("bob"));
    let (primary, tickets) = app.buy(&seller, &[9]).await;
    let ticket_id = tickets[0].ticket_id;

    app.ticketing.resale.list_for_resale(&seller, ticket_id, 30.0).await.unwrap();
    app.ticketing.resale.reserve_resale(&buyer, ticket_id).await.unwrap();
    let started = app
        .ticketing
        .resale
        .start_resale_checkout(&buyer, ticket_id, attendee(4))
        .await
        .unwrap();
    app.provider.mark_paid(&started.session_id);
    app.ticketing.resale.finalize_resale_purchase(&started.session_id).await.unwrap();

    let replay = app.ticketing.checkout.verify_and_finalize(&primary).await.unwrap();

    assert_eq!(replay.len(), 1);
    assert_eq!(replay[0].ticket_id, ticket_id);
    assert_eq!(replay[0].owner_id, buyer);
    assert_eq!(app.provider.verify_calls(), 2);
}

#[tokio::test]
async fn test_second_paid_resale_session_is_refunded() {
    let app = TestApp::new().await;
    let (seller, buyer) = (shopper("ann"), shopper("bob"));
    let (_, tickets) = app.buy(&seller, &[10]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&seller, ticket_id, 30.0).await.unwrap();
    app.ticketing.resale.reserve_resale(&buyer, ticket_id).await.unwrap();

    let first = app
        .ticketing
        .resale
        .start_resale_checkout(&buyer, ticket_id, attendee(5))
        .await
        .unwrap();
    let second = app
        .ticketing
        .resale
        .start_resale_checkout(&buyer, ticket_id, attendee(5))
        .await
        .unwrap();
    app.provider.mark_paid(&first.session_id);
    app.provider.mark_paid(&second.session_id);

    let transferred = app
        .ticketing
        .resale
        .finalize_resale_purchase(&first.session_id)
        .await
        .unwrap();
    let err = app
        .ticketing
        .resale
        .finalize_resale_purchase(&second.session_id)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(transferred.owner_id, buyer);
    assert_eq!(app.ledger.records().len(), 1);
    let refused = app.ticketing.checkout.session(&second.session_id).await.unwrap();
    assert_eq!(refused.status, CheckoutStatus::Failed);
    let current = app.ticketing.checkin.status(ticket_id).await.unwrap();
    assert_eq!(current.status, TicketStatus::Confirmed);
    assert_eq!(app.ticketing.checkin.tickets_for_owner(&buyer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resale_session_not_finalized_as_primary() {
    let app = TestApp::new().await;
    let (_, tickets) = app.buy(&shopper("ann"), &[1]).await;
    let ticket_id = tickets[0].ticket_id;
    app.ticketing.resale.list_for_resale(&shopper("ann"), ticket_id, 30.0).await.unwrap();
    app.ticketing.resale.reserve_resale(&shopper("bob"), ticket_id).await.unwrap();
    let started = app
        .ticketing
        .resale
        .start_resale_checkout(&shopper("bob"), ticket_id, attendee(3))
        .await
        .unwrap();
    app.provider.mark_paid(&started.session_id);

    let err = app
        .ticketing
        .checkout
        .verify_and_finalize(&started.session_id)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    let session = app.ticketing.checkout.session(&started.session_id).await.unwrap();
    assert_eq!(session.status, CheckoutStatus::Pending);
    let transferred = app
        .ticketing
        .resale
        .finalize_resale_purchase(&started.session_id)
        .await
        .unwrap();
    assert_eq!(transferred.owner_id, shopper("bob"));
}
