#[path = "common/mod.rs"]
mod common;

use anyhow::{anyhow, Result};
use common::*;
use std::collections::BTreeMap;
use std::path::Path;
use time::macros::datetime;
use time::OffsetDateTime;
use turnto_feeds::{
    header_line, Address, CatalogIndex, ExportOptions, JobParameters, Order, OrderBook, OrderExport, OrderSearch,
    OrderWindow, Outcome, Product, SitePreferences, ORDER_FEED_HEADER,
};

fn catalog() -> CatalogIndex {
    let mut hi_res = BTreeMap::new();
    hi_res.insert("hi-res".to_string(), vec!["https://img.test/H1-hi.jpg".to_string()]);
    let products = vec![
        product("P1", "Shirt"),
        master("M1", &[variant_summary("V1", None, None, None)]),
        variant("V1", "M1"),
        variant("V7", "M-gone"),
        Product { images: hi_res, ..product("H1", "Poster") },
    ];
    CatalogIndex::new(categories(), products)
}

fn orders() -> OrderBook {
    let mut o1 = shipped(
        order("O1", datetime!(2026-03-01 14:05:09 UTC), "en_US", &["P1"]),
        "S1",
        datetime!(2026-03-02 08:00:00 UTC),
    );
    o1.billing_address = Some(Address {
        postal_code: Some("01234".into()),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
    });
    o1.line_items.push(turnto_feeds::LineItem { product_id: None, adjusted_net_price: Some(5.0), shipment_id: None });

    OrderBook::new(vec![
        o1,
        order("O0", datetime!(2026-01-01 00:00:00 UTC), "en_US", &["P1"]),
        order("O2", datetime!(2026-03-05 10:00:00 +2), "fr_CA", &["V1", "GONE"]),
    ])
}

fn options(root: &Path) -> ExportOptions {
    ExportOptions::default().with_export_root(root).with_progress(false)
}

/// Rolling window: one file per locale with orders, one line per product line item,
/// timestamps as UTC `YYYY-MM-DD HH:MM:SS`, variants replaced by their master.
#[test]
fn rolling_window_exports_recent_orders_per_locale() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let book = orders();

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u)
        .with_reference_time(reference_now())
        .run();

    assert_eq!(result.outcome, Outcome::Success, "{result}");
    assert_eq!(result.message, "Export Orders was successful.");
    assert_eq!(result.stats.entities_read, 2);
    assert_eq!(result.stats.records_written, 2);
    assert_eq!(result.stats.files.len(), 2);

    let en = read_lines(&feed_path(dir.path(), "en_US", "orders"));
    assert_eq!(en.len(), 2, "O0 is outside the window; the product-less line item is dropped");
    assert_eq!(en[0], header_line(&ORDER_FEED_HEADER));
    let row = &en[1];
    assert_eq!(order_col(row, "ORDERID"), "O1");
    assert_eq!(order_col(row, "ORDERDATE"), "2026-03-01 14:05:09");
    assert_eq!(order_col(row, "EMAIL"), "O1@example.test");
    assert_eq!(order_col(row, "ITEMTITLE"), "Shirt");
    assert_eq!(order_col(row, "ITEMURL"), product_url("P1", "en_US"));
    assert_eq!(order_col(row, "ITEMLINEID"), "");
    assert_eq!(order_col(row, "ZIP"), "01234");
    assert_eq!(order_col(row, "FIRSTNAME"), "Ada");
    assert_eq!(order_col(row, "LASTNAME"), "Lovelace");
    assert_eq!(order_col(row, "SKU"), "P1");
    assert_eq!(order_col(row, "PRICE"), "19.99");
    assert_eq!(order_col(row, "ITEMIMAGEURL"), "https://img.test/P1-large.jpg");
    assert_eq!(order_col(row, "DELIVERYDATE"), "2026-03-02 08:00:00");
    assert_eq!(order_col(row, "NICKNAME"), "");
    assert_eq!(order_col(row, "LOCALE"), "en_US");

    let fr = read_lines(&feed_path(dir.path(), "fr_CA", "orders"));
    assert_eq!(fr.len(), 2, "unknown products are skipped");
    assert_eq!(order_col(&fr[1], "ORDERDATE"), "2026-03-05 08:00:00", "offsets are normalized to UTC");
    assert_eq!(order_col(&fr[1], "SKU"), "M1");
    assert_eq!(order_col(&fr[1], "ITEMTITLE"), "Shirt (fr)");
    assert_eq!(order_col(&fr[1], "ITEMURL"), product_url("M1", "fr_CA"));
    assert_eq!(order_col(&fr[1], "DELIVERYDATE"), "");

    assert!(!feed_path(dir.path(), "de_DE", "orders").exists(), "no orders, no file");
    assert!(!feed_path(dir.path(), "ja_JP", "orders").exists(), "ja_JP has no auth key");
}

/// Fixed cutoff: only orders created on or after the configured date.
#[test]
fn by_date_uses_the_cutoff_preference() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let book = orders();

    let result =
        OrderExport::by_date(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u).run();

    assert_eq!(result.outcome, Outcome::Success, "{result}");
    assert_eq!(result.message, "Export Orders by Date was successful.");
    assert!(!feed_path(dir.path(), "en_US", "orders").exists());
    let fr = read_lines(&feed_path(dir.path(), "fr_CA", "orders"));
    assert_eq!(fr.len(), 2);
    assert_eq!(order_col(&fr[1], "ORDERID"), "O2");
}

/// With variants on, the ordered variant is reported as itself.
#[test]
fn variants_are_kept_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = site();
    site.use_variants = true;
    let u = urls();
    let lookup = catalog();
    let book = orders();

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u)
        .with_reference_time(reference_now())
        .run();

    assert!(result.is_ok(), "{result}");
    let fr = read_lines(&feed_path(dir.path(), "fr_CA", "orders"));
    assert_eq!(order_col(&fr[1], "SKU"), "V1");
    assert_eq!(order_col(&fr[1], "ITEMTITLE"), "Shirt Red");
}

/// Unresolvable masters are skipped and counted; order lines never fall back to hi-res images.
#[test]
fn line_item_edge_cases() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let book = OrderBook::new(vec![order("O5", datetime!(2026-03-09 12:00:00 UTC), "en_US", &["V7", "H1"])]);

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u)
        .with_reference_time(reference_now())
        .run();

    assert!(result.is_ok(), "{result}");
    assert_eq!(result.stats.entities_skipped, 1);
    let en = read_lines(&feed_path(dir.path(), "en_US", "orders"));
    assert_eq!(en.len(), 2);
    assert_eq!(order_col(&en[1], "SKU"), "H1");
    assert_eq!(order_col(&en[1], "ITEMIMAGEURL"), "");
}

/// Missing or invalid window preferences stop the run before any I/O.
#[test]
fn window_preferences_are_mandatory() {
    let dir = tempfile::tempdir().unwrap();
    let u = urls();
    let lookup = catalog();
    let book = orders();

    let no_days = SitePreferences { historical_order_days: None, ..site() };
    let result =
        OrderExport::rolling(JobParameters::new("orders"), &no_days, options(dir.path()), &book, &lookup, &u).run();
    assert_eq!(result.outcome, Outcome::ConfigurationError);
    assert!(result.message.contains("turntoHistoricalOrderDays"), "{result}");

    let bad_date = SitePreferences { historical_order_date: Some("last tuesday".into()), ..site() };
    let result =
        OrderExport::by_date(JobParameters::new("orders"), &bad_date, options(dir.path()), &book, &lookup, &u).run();
    assert_eq!(result.outcome, Outcome::ConfigurationError);
    assert!(result.message.contains("turntoHistoricalOrderDate"), "{result}");

    let site = site();
    let result =
        OrderExport::rolling(JobParameters::default(), &site, options(dir.path()), &book, &lookup, &u).run();
    assert_eq!(result.outcome, Outcome::ConfigurationError);

    assert!(!dir.path().join("TurnTo").exists());
}

/// Disabled steps return OK and write nothing.
#[test]
fn disabled_order_step_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let book = orders();

    let result = OrderExport::by_date(
        JobParameters::new("orders").disabled(true),
        &site,
        options(dir.path()),
        &book,
        &lookup,
        &u,
    )
    .run();

    assert_eq!(result.outcome, Outcome::Disabled);
    assert!(result.is_ok());
    assert!(!dir.path().join("TurnTo").exists());
}

/// A write failure on one locale closes that file, the next locale is still exported and
/// the run ends in ERROR.
#[test]
fn write_failure_is_isolated_to_its_locale() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let book = orders();
    let sinks = MemorySinks::new().fail_write_when("en_US", "O1");

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u)
        .with_reference_time(reference_now())
        .with_sinks(sinks.clone())
        .run();

    assert_eq!(result.outcome, Outcome::RuntimeError, "{result}");
    assert!(result.message.contains("en_US"), "{result}");
    assert_eq!(sinks.opened(), 2);
    assert_eq!(sinks.closed(), 2);
    assert_eq!(sinks.lines("fr_CA").len(), 2);
}

/// Order search that fails for one locale.
struct FailingSearch {
    inner: OrderBook,
    fail_for: &'static str,
}

impl OrderSearch for FailingSearch {
    fn search_orders<'a>(
        &'a self,
        since: OffsetDateTime,
        locale: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<Order>> + 'a>> {
        if locale == self.fail_for {
            return Err(anyhow!("order index unavailable"));
        }
        self.inner.search_orders(since, locale)
    }
}

/// A search failure aborts the run after the files already written are closed.
#[test]
fn search_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let u = urls();
    let lookup = catalog();
    let search = FailingSearch { inner: orders(), fail_for: "fr_CA" };
    let sinks = MemorySinks::new();

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &search, &lookup, &u)
        .with_reference_time(reference_now())
        .with_sinks(sinks.clone())
        .run();

    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert!(result.message.contains("order index unavailable"), "{result}");
    assert_eq!(sinks.opened(), 1);
    assert_eq!(sinks.closed(), 1);
    assert_eq!(sinks.lines("en_US").len(), 2);
}

#[test]
fn window_cutoffs() {
    let now = reference_now();
    assert_eq!(OrderWindow::RollingDays(30).cutoff(now).unwrap(), datetime!(2026-02-08 00:00:00 UTC));
    let fixed = datetime!(2025-12-24 18:00:00 UTC);
    assert_eq!(OrderWindow::Since(fixed).cutoff(now).unwrap(), fixed);
    assert!(OrderWindow::RollingDays(u32::MAX).cutoff(now).is_err());
}

/// A day count reaching past the representable calendar is a configuration error, not a crash.
#[test]
fn out_of_range_window_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let u = urls();
    let lookup = catalog();
    let book = orders();
    let site = SitePreferences { historical_order_days: Some(u32::MAX), ..site() };

    let result = OrderExport::rolling(JobParameters::new("orders"), &site, options(dir.path()), &book, &lookup, &u)
        .with_reference_time(reference_now())
        .run();

    assert_eq!(result.outcome, Outcome::ConfigurationError, "{result}");
    assert!(result.message.contains("turntoHistoricalOrderDays"), "{result}");
    assert!(!dir.path().join("TurnTo").exists());
}
