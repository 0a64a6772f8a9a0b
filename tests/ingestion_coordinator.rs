use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use fundbook::clock::FixedClock;
use fundbook::error::FetchFailure;
use fundbook::ingest::{IngestionCoordinator, InstrumentStatus};
use fundbook::market_data::QuoteSource;
use fundbook::models::{Category, Instrument, InstrumentCode, Quote, QuoteWrite};
use fundbook::storage::{MemoryStorage, Storage};
use rust_decimal_macros::dec;

mod support;
use support::{at, fund, FailingCommitStorage, InterleavedWriteSource, ScriptedQuoteSource};

async fn seed(storage: &dyn Storage, instruments: &[&Instrument]) -> Result<()> {
    for instrument in instruments {
        assert!(storage.insert_instrument(instrument).await?);
    }
    Ok(())
}

fn coordinator(
    storage: Arc<dyn Storage>,
    source: Arc<dyn QuoteSource>,
    clock: Arc<FixedClock>,
) -> IngestionCoordinator {
    IngestionCoordinator::new(storage, source).with_clock(clock)
}

#[tokio::test]
async fn refreshes_never_updated_first_then_oldest() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let now = at(2024, 3, 10, 12);
    let clock = Arc::new(FixedClock::new(now));

    let old = fund("OLD", "Old fund");
    let recent = fund("REC", "Recent fund");
    let never_b = fund("NVB", "Never B");
    let never_a = fund("NVA", "Never A");
    seed(storage.as_ref(), &[&old, &recent, &never_b, &never_a]).await?;
    storage
        .commit_quotes(&[
            QuoteWrite::Insert(Quote::new(old.id.clone(), at(2024, 3, 7, 9), dec!(1))),
            QuoteWrite::Insert(Quote::new(recent.id.clone(), at(2024, 3, 9, 9), dec!(2))),
        ])
        .await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("OLD", dec!(1.1))
            .with_price("REC", dec!(2.2))
            .with_price("NVA", dec!(3.3))
            .with_price("NVB", dec!(4.4)),
    );
    let report = coordinator(storage.clone(), source.clone(), clock).run().await?;

    assert_eq!(source.calls(), vec!["NVA", "NVB", "OLD", "REC"]);
    assert_eq!(source.warm_ups(), 1);
    assert_eq!(report.new_records(), 4);
    assert_eq!(report.failed, 0);

    let latest = storage.latest_quote(&never_a.id).await?.unwrap();
    assert_eq!(latest.price, dec!(3.3));
    assert_eq!(latest.timestamp, now);
    Ok(())
}

#[tokio::test]
async fn skips_instruments_inside_freshness_window() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let now = at(2024, 3, 10, 12);
    let clock = Arc::new(FixedClock::new(now));

    let fresh = fund("FRS", "Fresh");
    let stale = fund("STL", "Stale");
    seed(storage.as_ref(), &[&fresh, &stale]).await?;
    let fresh_at = now - chrono::Duration::minutes(30);
    storage
        .commit_quotes(&[
            QuoteWrite::Insert(Quote::new(fresh.id.clone(), fresh_at, dec!(1))),
            QuoteWrite::Insert(Quote::new(
                stale.id.clone(),
                now - chrono::Duration::hours(2),
                dec!(1),
            )),
        ])
        .await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("FRS", dec!(9))
            .with_price("STL", dec!(1.5)),
    );
    let report = coordinator(storage.clone(), source.clone(), clock).run().await?;

    assert_eq!(source.calls(), vec!["STL"]);
    assert_eq!(report.skipped_fresh, 1);
    assert_eq!(
        report.outcome("FRS"),
        Some(&InstrumentStatus::SkippedFresh {
            last_updated: fresh_at
        })
    );
    // Same day, different price: updated in place.
    assert_eq!(report.updated, 1);
    assert_eq!(report.new_records(), 0);
    Ok(())
}

#[tokio::test]
async fn all_fresh_run_makes_no_requests() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let now = at(2024, 3, 10, 12);
    let clock = Arc::new(FixedClock::new(now));
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&only]).await?;
    storage
        .commit_quotes(&[QuoteWrite::Insert(Quote::new(
            only.id.clone(),
            now - chrono::Duration::minutes(5),
            dec!(1),
        ))])
        .await?;

    let source = Arc::new(ScriptedQuoteSource::new().with_price("ONE", dec!(2)));
    let report = coordinator(storage, source.clone(), clock).run().await?;

    assert!(source.calls().is_empty());
    assert_eq!(source.warm_ups(), 0);
    assert_eq!(report.skipped_fresh, 1);
    Ok(())
}

#[tokio::test]
async fn custom_freshness_window_is_honored() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let now = at(2024, 3, 10, 12);
    let clock = Arc::new(FixedClock::new(now));
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&only]).await?;
    storage
        .commit_quotes(&[QuoteWrite::Insert(Quote::new(
            only.id.clone(),
            now - chrono::Duration::minutes(5),
            dec!(1),
        ))])
        .await?;

    let source = Arc::new(ScriptedQuoteSource::new().with_price("ONE", dec!(1)));
    let report = coordinator(storage, source.clone(), clock)
        .with_freshness_window(Duration::from_secs(60))
        .run()
        .await?;

    assert_eq!(source.calls(), vec!["ONE"]);
    assert_eq!(report.unchanged, 1);
    Ok(())
}

#[tokio::test]
async fn one_exhausted_instrument_does_not_abort_the_run() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 12)));
    let good = fund("AAA", "Good");
    let bad = fund("BBB", "Blocked");
    let also_good = fund("CCC", "Also good");
    seed(storage.as_ref(), &[&good, &bad, &also_good]).await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("AAA", dec!(1))
            .with_failure("BBB", 10, FetchFailure::blocked("captcha"))
            .with_price("CCC", dec!(3)),
    );
    let report = coordinator(storage.clone(), source, clock).run().await?;

    assert_eq!(report.new_records(), 2);
    assert_eq!(report.failed, 1);
    assert!(matches!(
        report.outcome("BBB"),
        Some(InstrumentStatus::Failed { attempts: 10, kind, .. }) if kind == "blocked"
    ));
    assert!(storage.latest_quote(&bad.id).await?.is_none());
    assert!(storage.latest_quote(&also_good.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn same_day_reruns_keep_one_quote_per_day() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 9)));
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&only]).await?;

    let source = Arc::new(ScriptedQuoteSource::new().with_price("ONE", dec!(1.75)));
    let coordinator = coordinator(storage.clone(), source.clone(), clock.clone());

    let first = coordinator.run().await?;
    assert_eq!(first.new_records(), 1);

    // Past the freshness window, same day, same price.
    clock.advance(chrono::Duration::hours(2));
    let second = coordinator.run().await?;
    assert_eq!(second.new_records(), 0);
    assert_eq!(second.unchanged, 1);

    let quotes = storage.quote_history(&[only.id.clone()]).await?;
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].timestamp, at(2024, 3, 10, 9));

    // Next day inserts a new row.
    clock.advance(chrono::Duration::days(1));
    let third = coordinator.run().await?;
    assert_eq!(third.new_records(), 1);
    assert_eq!(storage.quote_history(&[only.id.clone()]).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn same_day_price_change_overwrites_existing_quote() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 15)));
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&only]).await?;
    let morning = Quote::new(only.id.clone(), at(2024, 3, 10, 9), dec!(1.00));
    storage
        .commit_quotes(&[QuoteWrite::Insert(morning.clone())])
        .await?;

    let source = Arc::new(ScriptedQuoteSource::new().with_price("ONE", dec!(1.10)));
    let report = coordinator(storage.clone(), source, clock).run().await?;

    assert_eq!(
        report.outcome("ONE"),
        Some(&InstrumentStatus::Updated {
            price: dec!(1.10),
            previous_price: dec!(1.00)
        })
    );
    let quotes = storage.quote_history(&[only.id.clone()]).await?;
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].id, morning.id);
    assert_eq!(quotes[0].price, dec!(1.10));
    assert_eq!(quotes[0].timestamp, at(2024, 3, 10, 15));
    Ok(())
}

#[tokio::test]
async fn only_funds_are_ingested() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 12)));
    let stock = Instrument::new(
        InstrumentCode::parse("THYAO").unwrap(),
        "Stock",
        Category::Stock,
        at(2024, 1, 1, 0),
    );
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&stock, &only]).await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("ONE", dec!(1))
            .with_price("THYAO", dec!(100)),
    );
    coordinator(storage, source.clone(), clock).run().await?;
    assert_eq!(source.calls(), vec!["ONE"]);
    Ok(())
}

#[tokio::test]
async fn warm_up_failure_is_not_fatal() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 12)));
    let only = fund("ONE", "Only");
    seed(storage.as_ref(), &[&only]).await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("ONE", dec!(1))
            .with_failing_warm_up(),
    );
    let report = coordinator(storage, source.clone(), clock).run().await?;
    assert_eq!(source.warm_ups(), 1);
    assert_eq!(report.new_records(), 1);
    Ok(())
}

#[tokio::test]
async fn commit_failure_surfaces_and_writes_nothing() -> Result<()> {
    let storage = Arc::new(FailingCommitStorage::default());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 12)));
    let a = fund("AAA", "A");
    let b = fund("BBB", "B");
    seed(&storage.inner, &[&a, &b]).await?;

    let source = Arc::new(
        ScriptedQuoteSource::new()
            .with_price("AAA", dec!(1))
            .with_price("BBB", dec!(2)),
    );
    let err = coordinator(storage.clone(), source.clone(), clock)
        .run()
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("disk full"));
    assert_eq!(source.calls().len(), 2);
    assert!(storage.inner.latest_quote(&a.id).await?.is_none());
    assert!(storage.inner.latest_quote(&b.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn same_day_quote_committed_mid_run_is_merged_not_fatal() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 10, 12)));
    let a = fund("AAA", "A");
    let b = fund("BBB", "B");
    seed(storage.as_ref(), &[&a, &b]).await?;

    // Another run stores AAA for today while this run is fetching BBB.
    let source = Arc::new(InterleavedWriteSource {
        inner: ScriptedQuoteSource::new()
            .with_price("AAA", dec!(1.50))
            .with_price("BBB", dec!(2)),
        storage: storage.clone(),
        on_code: "BBB".to_string(),
        write: Quote::new(a.id.clone(), at(2024, 3, 10, 11), dec!(1.00)),
        clock: None,
    });
    let report = coordinator(storage.clone(), source, clock).run().await?;
    assert_eq!(report.inserted, 2);

    let a_quotes = storage.quote_history(&[a.id.clone()]).await?;
    assert_eq!(a_quotes.len(), 1);
    assert_eq!(a_quotes[0].price, dec!(1.50));
    assert_eq!(a_quotes[0].timestamp, at(2024, 3, 10, 12));
    assert_eq!(storage.latest_quote(&b.id).await?.unwrap().price, dec!(2));
    Ok(())
}

#[tokio::test]
async fn run_crossing_midnight_plans_against_the_fetch_day() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let start = Utc.with_ymd_and_hms(2024, 3, 10, 23, 50, 0).unwrap();
    let clock = Arc::new(FixedClock::new(start));
    let a = fund("AAA", "A");
    let b = fund("BBB", "B");
    seed(storage.as_ref(), &[&a, &b]).await?;

    // The clock passes midnight before BBB is fetched, and BBB already has a
    // quote for the new day at the same price.
    let after_midnight = Utc.with_ymd_and_hms(2024, 3, 11, 0, 30, 0).unwrap();
    let existing = Quote::new(
        b.id.clone(),
        Utc.with_ymd_and_hms(2024, 3, 11, 0, 10, 0).unwrap(),
        dec!(2),
    );
    let source = Arc::new(InterleavedWriteSource {
        inner: ScriptedQuoteSource::new()
            .with_price("AAA", dec!(1))
            .with_price("BBB", dec!(2)),
        storage: storage.clone(),
        on_code: "BBB".to_string(),
        write: existing.clone(),
        clock: Some((clock.clone(), after_midnight)),
    });
    let report = coordinator(storage.clone(), source, clock).run().await?;

    assert_eq!(report.outcome("AAA"), Some(&InstrumentStatus::Inserted { price: dec!(1) }));
    assert_eq!(report.outcome("BBB"), Some(&InstrumentStatus::Unchanged { price: dec!(2) }));
    assert_eq!(storage.latest_quote(&a.id).await?.unwrap().timestamp, start);
    let b_quotes = storage.quote_history(&[b.id.clone()]).await?;
    assert_eq!(b_quotes, vec![existing]);
    Ok(())
}
