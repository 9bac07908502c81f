//! Create, read, list and cancel through the dispatcher.

mod common;

use std::time::Duration;

use common::{BookCall, Harness, new_fixed_offer};
use peerbook_node::{NewOffer, OfferFilter, PLACEMENT_SUPERSEDED, RetryJournal};
use peerbook_types::*;
use rust_decimal::Decimal;
use tokio::time::timeout;

#[tokio::test]
async fn created_offer_becomes_active_once_published() {
    let h = Harness::new();
    let pending = h
        .dispatcher
        .create_offer(new_fixed_offer("EUR", "61000"))
        .await
        .unwrap();
    let id = pending.offer_id();
    let offer = pending.await.unwrap();

    assert_eq!(offer.id, id);
    assert!(offer.is_active());
    assert_eq!(offer.fixed_price, Price(610_000_000));
    assert_eq!(h.stored(id), offer);
    assert_eq!(h.book.calls(), vec![BookCall::Add(id)]);
    assert!(h.book.added()[0].offer.is_active());
}

#[tokio::test]
async fn rejected_placement_leaves_offer_inactive() {
    let h = Harness::new();
    h.book.fail_next_additions(1);
    let pending = h
        .dispatcher
        .create_offer(new_fixed_offer("EUR", "61000"))
        .await
        .unwrap();
    let id = pending.offer_id();
    let err = pending.await.unwrap_err();
    assert!(matches!(err, PeerbookError::BookUpdateFailed { .. }));

    assert!(!h.stored(id).is_active());
    assert!(h.journal.contains(id));

    // Reconciliation withdraws whatever may have reached the book.
    let report = h.dispatcher.retry_pending().await;
    assert_eq!(report.reconciled, 1);
    assert_eq!(h.book.calls(), vec![BookCall::Add(id), BookCall::Remove(id)]);
    assert!(!h.journal.contains(id));
}

#[tokio::test]
async fn invalid_creation_is_refused_before_storage() {
    let h = Harness::new();
    let request = NewOffer {
        trigger_price: 5,
        ..new_fixed_offer("EUR", "61000")
    };
    let err = h.dispatcher.create_offer(request).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::IllegalState);
    assert!(h.dispatcher.store().is_empty());
    h.dispatcher.flush().await;
    assert!(h.book.calls().is_empty());
}

#[tokio::test]
async fn cancel_does_not_wait_for_inflight_placement() {
    let h = Harness::new();
    h.book.set_latency(Duration::from_millis(300));
    let pending = h
        .dispatcher
        .create_offer(new_fixed_offer("EUR", "61000"))
        .await
        .unwrap();
    let id = pending.offer_id();
    assert!(h.dispatcher.coordinator().is_placing(id));

    timeout(Duration::from_millis(100), h.dispatcher.cancel_offer(id))
        .await
        .expect("cancel must not wait for the book")
        .unwrap();
    assert!(!h.dispatcher.store().contains(id));

    let err = pending.await.unwrap_err();
    assert!(matches!(err, PeerbookError::OfferNotFound(_)), "{err}");
    h.dispatcher.flush().await;
    assert_eq!(h.book.calls(), vec![BookCall::Add(id), BookCall::Remove(id)]);
    assert!(h.journal.pending().is_empty());
    assert!(!h.dispatcher.coordinator().is_placing(id));
}

#[tokio::test]
async fn edit_during_placement_supersedes_it() {
    let h = Harness::new();
    h.book.set_latency(Duration::from_millis(200));
    let pending = h
        .dispatcher
        .create_offer(new_fixed_offer("USD", "100"))
        .await
        .unwrap();
    let id = pending.offer_id();

    let mut req = common::edit_request(id, EditType::FixedPriceOnly);
    req.price = "101".into();
    let receipt = timeout(Duration::from_millis(100), h.dispatcher.edit_offer(req))
        .await
        .expect("edit must not wait for the book")
        .unwrap();
    receipt.ticket.await.unwrap();

    let err = pending.await.unwrap_err();
    assert!(matches!(err, PeerbookError::IllegalState { .. }), "{err}");
    assert!(err.to_string().contains(PLACEMENT_SUPERSEDED));

    let stored = h.stored(id);
    assert!(!stored.is_active());
    assert_eq!(stored.fixed_price, Price(1_010_000));
    assert_eq!(h.book.calls(), vec![BookCall::Add(id), BookCall::Remove(id)]);
}

#[tokio::test]
async fn edit_after_placement_republishes() {
    let h = Harness::new();
    let pending = h
        .dispatcher
        .create_offer(new_fixed_offer("USD", "100"))
        .await
        .unwrap();
    let id = pending.offer_id();
    pending.await.unwrap();

    let mut req = common::edit_request(id, EditType::FixedPriceOnly);
    req.price = "101".into();
    h.dispatcher.edit_offer(req).await.unwrap().ticket.await.unwrap();

    let stored = h.stored(id);
    assert!(stored.is_active());
    assert_eq!(stored.fixed_price, Price(1_010_000));
    assert_eq!(
        h.book.calls(),
        vec![BookCall::Add(id), BookCall::Remove(id), BookCall::Add(id)]
    );
}

#[tokio::test]
async fn get_offer_reports_effective_price() {
    let h = Harness::new();
    let market = Offer::dummy_market(Direction::Sell, "EUR", Decimal::new(1, 1), Price::ZERO);
    let fixed = Offer::dummy_fixed(Direction::Buy, "EUR", Price(600_000_000));
    h.seed(&market);
    h.seed(&fixed);

    assert_eq!(h.dispatcher.get_offer(market.id).unwrap().effective_price, None);

    h.feed.set_price("EUR", Decimal::new(60_000, 0));
    let snapshot = h.dispatcher.get_offer(market.id).unwrap();
    assert_eq!(snapshot.offer, market);
    assert_eq!(snapshot.effective_price, Some(Decimal::new(60_060, 0)));

    let snapshot = h.dispatcher.get_offer(fixed.id).unwrap();
    assert_eq!(snapshot.effective_price, Some(Decimal::new(60_000, 0)));
}

#[tokio::test]
async fn buy_side_margin_lowers_effective_price() {
    let h = Harness::new();
    let offer = Offer::dummy_market(Direction::Buy, "USD", Decimal::new(2, 0), Price::ZERO);
    h.seed(&offer);
    h.feed.set_price("USD", Decimal::new(50_000, 0));
    let snapshot = h.dispatcher.get_offer(offer.id).unwrap();
    assert_eq!(snapshot.effective_price, Some(Decimal::new(49_000, 0)));
}

#[tokio::test]
async fn list_offers_filters_and_orders() {
    let h = Harness::new();
    let mut first = Offer::dummy_fixed(Direction::Buy, "EUR", Price(1));
    first.terms.created_at -= chrono::Duration::minutes(5);
    let second = Offer::dummy_fixed(Direction::Sell, "EUR", Price(2));
    let third = Offer::dummy_fixed(Direction::Buy, "USD", Price(3));
    for offer in [&third, &second, &first] {
        h.seed(offer);
    }

    let all = h.dispatcher.list_offers(&OfferFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].offer.id, first.id);

    let buys = h
        .dispatcher
        .list_offers(&OfferFilter {
            direction: Some(Direction::Buy),
            currency_code: None,
        })
        .unwrap();
    let ids: Vec<_> = buys.iter().map(|s| s.offer.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);

    let eur = h
        .dispatcher
        .list_offers(&OfferFilter {
            direction: None,
            currency_code: Some("EUR".into()),
        })
        .unwrap();
    assert_eq!(eur.len(), 2);
}

#[tokio::test]
async fn cancel_active_offer_withdraws_it() {
    let h = Harness::new();
    let offer = Offer::dummy_fixed(Direction::Sell, "EUR", Price(100));
    h.seed(&offer);

    h.dispatcher.cancel_offer(offer.id).await.unwrap();
    assert!(!h.dispatcher.store().contains(offer.id));
    h.dispatcher.flush().await;
    assert_eq!(h.book.calls(), vec![BookCall::Remove(offer.id)]);

    let err = h.dispatcher.cancel_offer(offer.id).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::NotFound);
}

#[tokio::test]
async fn cancel_inactive_offer_is_local() {
    let h = Harness::new();
    let mut offer = Offer::dummy_fixed(Direction::Sell, "EUR", Price(100));
    offer.activation = ActivationState::Inactive;
    h.seed(&offer);

    h.dispatcher.cancel_offer(offer.id).await.unwrap();
    h.dispatcher.flush().await;
    assert!(h.book.calls().is_empty());
    assert!(h.dispatcher.store().is_empty());
}

#[tokio::test]
async fn failed_withdrawal_is_retried() {
    let h = Harness::new();
    let offer = Offer::dummy_fixed(Direction::Sell, "EUR", Price(100));
    h.seed(&offer);
    h.book.fail_next_removals(1);

    h.dispatcher.cancel_offer(offer.id).await.unwrap();
    h.dispatcher.flush().await;
    assert!(h.journal.contains(offer.id));

    let report = h.dispatcher.retry_pending().await;
    assert_eq!(report.reconciled, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        h.book.calls(),
        vec![BookCall::Remove(offer.id), BookCall::Remove(offer.id)]
    );
    assert!(h.journal.pending().is_empty());
}
