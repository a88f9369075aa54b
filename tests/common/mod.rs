#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::macros::datetime;
use time::OffsetDateTime;
use turnto_feeds::{
    Category, LineItem, Money, Order, Product, ProductKind, Shipment, SinkFactory, SitePreferences, StorefrontUrls,
    VariantSummary, CATALOG_FEED_HEADER, ORDER_FEED_HEADER,
};

pub const SITE_ID: &str = "SiteGenesis";
pub const HOST: &str = "shop.test";

/// Two keyed groups: `en_US` alone and `fr_CA,de_DE` together, plus a key without an
/// auth key covering `ja_JP`.
pub const KEYS_JSON: &str = r#"{
    "k1": { "locales": "en_US", "authKey": "AUTH-1" },
    "k2": { "locales": "fr_CA, de_DE", "authKey": "AUTH-2", "domain": "https://eu.turnto.test" },
    "k3": { "locales": "ja_JP", "authKey": "" }
}"#;

/// Site with every fixture locale allowed and the two-group key mapping above.
pub fn site() -> SitePreferences {
    site_with(&["en_US", "fr_CA", "de_DE", "ja_JP"], KEYS_JSON)
}

pub fn site_with(allowed: &[&str], keys_json: &str) -> SitePreferences {
    SitePreferences {
        site_id: SITE_ID.into(),
        default_locale: "en_US".into(),
        allowed_locales: allowed.iter().map(|s| s.to_string()).collect(),
        historical_order_days: Some(30),
        historical_order_date: Some("2026-03-03".into()),
        default_data_center_url: Some("https://www.turnto.test".into()),
        ..SitePreferences::default()
    }
    .with_site_auth_keys(keys_json)
}

pub fn urls() -> StorefrontUrls {
    StorefrontUrls::new("https", HOST, SITE_ID).unwrap()
}

pub fn product_url(pid: &str, locale: &str) -> String {
    format!("https://{HOST}/on/demandware.store/Sites-{SITE_ID}-Site/{locale}/Product-Show?pid={pid}")
}

pub fn category_url(cgid: &str) -> String {
    format!("https://{HOST}/on/demandware.store/Sites-{SITE_ID}-Site/en_US/Search-Show?cgid={cgid}")
}

// ----------------------------- Catalog fixtures ------------------------------------

/// root -> mens -> shirts, plus a sale category hanging directly off the root.
pub fn categories() -> Vec<Category> {
    vec![
        Category { id: "root".into(), display_name: Some("Storefront".into()), parent: None, root: true },
        Category { id: "mens".into(), display_name: Some("Mens".into()), parent: Some("root".into()), root: false },
        Category {
            id: "shirts".into(),
            display_name: Some("Shirts".into()),
            parent: Some("mens".into()),
            root: false,
        },
    ]
}

/// An orderable, online standard product filed under `shirts`.
pub fn product(id: &str, name: &str) -> Product {
    let mut images = BTreeMap::new();
    images.insert("large".to_string(), vec![format!("https://img.test/{id}-large.jpg")]);
    Product {
        id: id.into(),
        kind: ProductKind::Standard,
        name: Some(name.into()),
        localized_names: BTreeMap::from([("fr".to_string(), format!("{name} (fr)"))]),
        primary_category: Some("shirts".into()),
        images,
        price: Some(Money { value: 20.0, currency: "USD".into() }),
        orderable: true,
        online: true,
        brand: Some("Acme".into()),
        page_keywords: Some("shirt, cotton".into()),
        manufacturer_sku: Some(format!("MPN-{id}")),
        upc: Some("0001".into()),
        ..Product::default()
    }
}

pub fn master(id: &str, variants: &[VariantSummary]) -> Product {
    Product { kind: ProductKind::Master, variants: variants.to_vec(), ..product(id, "Shirt") }
}

pub fn variant(id: &str, master_id: &str) -> Product {
    Product { kind: ProductKind::Variant, master_id: Some(master_id.into()), ..product(id, "Shirt Red") }
}

pub fn variant_summary(id: &str, mpn: Option<&str>, upc: Option<&str>, ean: Option<&str>) -> VariantSummary {
    VariantSummary {
        id: id.into(),
        manufacturer_sku: mpn.map(str::to_string),
        upc: upc.map(str::to_string),
        ean: ean.map(str::to_string),
    }
}

/// `n` standard products with ids SKU-01, SKU-02, ...
pub fn numbered_products(n: usize) -> Vec<Product> {
    (1..=n).map(|i| product(&format!("SKU-{i:02}"), &format!("Item {i}"))).collect()
}

// ----------------------------- Order fixtures ------------------------------------

pub fn order(no: &str, created: OffsetDateTime, locale: &str, product_ids: &[&str]) -> Order {
    Order {
        order_no: no.into(),
        creation_date: created,
        customer_email: Some(format!("{no}@example.test")),
        customer_locale: Some(locale.into()),
        billing_address: None,
        line_items: product_ids
            .iter()
            .map(|pid| LineItem { product_id: Some(pid.to_string()), adjusted_net_price: Some(19.99), shipment_id: None })
            .collect(),
        shipments: Vec::new(),
    }
}

pub fn shipped(mut order: Order, shipment_id: &str, shipped_at: OffsetDateTime) -> Order {
    for item in &mut order.line_items {
        item.shipment_id = Some(shipment_id.into());
    }
    order.shipments.push(Shipment { id: shipment_id.into(), creation_date: shipped_at });
    order
}

/// "Now" for rolling-window tests.
pub fn reference_now() -> OffsetDateTime {
    datetime!(2026-03-10 00:00:00 UTC)
}

// ----------------------------- Files ------------------------------------

/// Write plain NDJSON lines.
pub fn write_ndjson(path: &Path, values: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for v in values {
        writeln!(f, "{}", v).unwrap();
    }
}

/// Write a compressed `.zst` file containing the provided JSONL lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

pub fn to_json(p: &Product) -> Value {
    serde_json::to_value(p).unwrap()
}

/// A product line the deserializer rejects.
pub fn broken_product_line() -> Value {
    json!({ "id": "BROKEN", "price": "not-an-object" })
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

pub fn feed_path(root: &Path, segment: &str, base: &str) -> PathBuf {
    root.join("TurnTo").join(segment).join(format!("{base}_{segment}_{SITE_ID}.txt"))
}

/// Value of `column` in a catalog feed line.
pub fn catalog_col<'a>(line: &'a str, column: &str) -> &'a str {
    col(line, &CATALOG_FEED_HEADER, column)
}

/// Value of `column` in an order feed line.
pub fn order_col<'a>(line: &'a str, column: &str) -> &'a str {
    col(line, &ORDER_FEED_HEADER, column)
}

fn col<'a>(line: &'a str, header: &[&str], column: &str) -> &'a str {
    let idx = header.iter().position(|c| *c == column).unwrap();
    let fields: Vec<&str> = line.split('\t').collect();
    assert_eq!(fields.len(), header.len(), "wrong column count in {line:?}");
    fields[idx]
}

// ----------------------------- Instrumented sinks ------------------------------------

#[derive(Debug, Default)]
pub struct SinkState {
    pub opened: usize,
    pub closed: usize,
    pub contents: BTreeMap<PathBuf, String>,
}

/// In-memory sinks that count opens and closes (a sink is closed when dropped) and can be
/// told to fail on creation or on a write.
#[derive(Clone, Default)]
pub struct MemorySinks {
    pub state: Arc<Mutex<SinkState>>,
    fail_create: Option<String>,
    fail_write: Option<(String, String)>,
}

impl MemorySinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creating any path containing `path_part` fails.
    pub fn fail_create_when(mut self, path_part: &str) -> Self {
        self.fail_create = Some(path_part.into());
        self
    }

    /// Writing data containing `data_part` to a path containing `path_part` fails.
    pub fn fail_write_when(mut self, path_part: &str, data_part: &str) -> Self {
        self.fail_write = Some((path_part.into(), data_part.into()));
        self
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Non-empty lines written to the sink whose path contains `path_part`.
    pub fn lines(&self, path_part: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .contents
            .iter()
            .find(|(p, _)| p.to_string_lossy().contains(path_part))
            .map(|(_, c)| c.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

pub struct MemorySink {
    path: PathBuf,
    state: Arc<Mutex<SinkState>>,
    fail_on: Option<String>,
}

impl SinkFactory for MemorySinks {
    type Sink = MemorySink;

    fn create(&self, path: &Path) -> io::Result<MemorySink> {
        let p = path.to_string_lossy();
        if self.fail_create.as_deref().is_some_and(|part| p.contains(part)) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "create refused"));
        }
        let fail_on = self
            .fail_write
            .as_ref()
            .filter(|(path_part, _)| p.contains(path_part.as_str()))
            .map(|(_, data)| data.clone());
        let mut state = self.state.lock().unwrap();
        state.opened += 1;
        state.contents.insert(path.to_path_buf(), String::new());
        Ok(MemorySink { path: path.to_path_buf(), state: Arc::clone(&self.state), fail_on })
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        if self.fail_on.as_deref().is_some_and(|m| text.contains(m)) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let mut state = self.state.lock().unwrap();
        state.contents.entry(self.path.clone()).or_default().push_str(&text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed += 1;
        }
    }
}
