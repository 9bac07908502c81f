//! Node startup from a data directory: admission overrides and the
//! persisted retry journal.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BookCall, RecordingOrderBook, edit_request};
use peerbook_node::*;
use peerbook_types::*;
use rust_decimal::Decimal;

fn collaborators(book: &Arc<RecordingOrderBook>) -> Collaborators {
    Collaborators {
        book: book.clone(),
        signer: Arc::new(Ed25519OfferSigner::generate()),
        price_feed: Arc::new(StaticPriceFeed::new()),
    }
}

#[tokio::test]
async fn startup_reconciles_persisted_intents() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::with_data_dir(dir.path());
    let stale = OfferId::new();
    {
        let journal = JsonFileRetryJournal::open(config.retry_journal_path()).unwrap();
        journal.record(RetryIntent::new(stale, "node stopped")).unwrap();
    }

    let book = Arc::new(RecordingOrderBook::default());
    let (_dispatcher, _worker) = RequestDispatcher::start(&config, collaborators(&book))
        .await
        .unwrap();

    assert_eq!(book.calls(), vec![BookCall::Remove(stale)]);
    let reopened = JsonFileRetryJournal::open(config.retry_journal_path()).unwrap();
    assert!(reopened.pending().is_empty());
}

#[tokio::test]
async fn failed_republish_survives_restart() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::with_data_dir(dir.path());
    std::fs::write(
        dir.path().join("ratemeters.json"),
        r#"{"peerbook.Offers/EditOffer": {"count": 100, "windowUnit": "SECONDS"}}"#,
    )
    .unwrap();

    let book = Arc::new(RecordingOrderBook::default());
    let (dispatcher, _worker) = RequestDispatcher::start(&config, collaborators(&book))
        .await
        .unwrap();
    let offer = Offer::dummy_market(Direction::Sell, "EUR", Decimal::ONE, Price::ZERO);
    dispatcher.store().insert(offer.clone()).unwrap();

    book.fail_next_removals(1);
    let mut req = edit_request(offer.id, EditType::MktPriceMarginOnly);
    req.market_price_margin = Decimal::new(2, 0);
    let receipt = dispatcher.edit_offer(req.clone()).await.unwrap();
    assert!(receipt.ticket.await.is_err());

    let journal = JsonFileRetryJournal::open(config.retry_journal_path()).unwrap();
    assert!(journal.contains(offer.id));

    // The override lifts the one-per-minute default.
    req.market_price_margin = Decimal::new(3, 0);
    dispatcher.edit_offer(req).await.unwrap().ticket.await.unwrap();
    let journal = JsonFileRetryJournal::open(config.retry_journal_path()).unwrap();
    assert!(!journal.contains(offer.id));
}

#[tokio::test]
async fn background_pass_heals_failed_republish() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        retry_interval_ms: 50,
        ..NodeConfig::with_data_dir(dir.path())
    };
    let book = Arc::new(RecordingOrderBook::default());
    let (dispatcher, _worker) = RequestDispatcher::start(&config, collaborators(&book))
        .await
        .unwrap();
    let offer = Offer::dummy_market(Direction::Sell, "EUR", Decimal::ONE, Price::ZERO);
    dispatcher.store().insert(offer.clone()).unwrap();

    book.fail_next_removals(1);
    let mut req = edit_request(offer.id, EditType::MktPriceMarginOnly);
    req.market_price_margin = Decimal::new(2, 0);
    let receipt = dispatcher.edit_offer(req).await.unwrap();
    assert!(receipt.ticket.await.is_err());

    let journal = dispatcher.coordinator().journal();
    tokio::time::timeout(Duration::from_secs(5), async {
        while journal.contains(offer.id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background pass should reconcile the offer");

    assert_eq!(
        book.calls(),
        vec![
            BookCall::Remove(offer.id),
            BookCall::Remove(offer.id),
            BookCall::Add(offer.id),
        ]
    );
    assert_eq!(book.added()[0].offer.market_price_margin, Decimal::new(2, 0));
}

#[tokio::test]
async fn overrides_file_leaves_unnamed_operations_unmetered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ratemeters.json"),
        r#"{"peerbook.Offers/EditOffer": {"count": 1, "windowUnit": "DAYS"}}"#,
    )
    .unwrap();
    let book = Arc::new(RecordingOrderBook::default());
    let (dispatcher, _worker) =
        RequestDispatcher::start(&NodeConfig::with_data_dir(dir.path()), collaborators(&book))
            .await
            .unwrap();
    let offer = Offer::dummy_fixed(Direction::Buy, "EUR", Price(100));
    dispatcher.store().insert(offer.clone()).unwrap();

    for _ in 0..5 {
        dispatcher.get_offer(offer.id).unwrap();
    }
    let req = edit_request(offer.id, EditType::ActivationStateOnly);
    dispatcher.edit_offer(req.clone()).await.unwrap();
    let err = dispatcher.edit_offer(req).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::ResourceExhausted);
}

#[tokio::test]
async fn huge_override_count_starts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ratemeters.json"),
        r#"{"peerbook.Offers/GetOffer": {"count": 4000000000, "windowUnit": "DAYS"}}"#,
    )
    .unwrap();
    let book = Arc::new(RecordingOrderBook::default());
    let started =
        RequestDispatcher::start(&NodeConfig::with_data_dir(dir.path()), collaborators(&book)).await;
    assert!(started.is_ok());
}

#[tokio::test]
async fn bad_overrides_file_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ratemeters.json"),
        r#"{"peerbook.Offers/EditOffer": {"count": 0, "windowUnit": "SECONDS"}}"#,
    )
    .unwrap();
    let book = Arc::new(RecordingOrderBook::default());
    let result = RequestDispatcher::start(&NodeConfig::with_data_dir(dir.path()), collaborators(&book)).await;
    assert!(matches!(result, Err(PeerbookError::Configuration(_))));
}
