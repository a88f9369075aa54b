//! Seams to the commerce platform (product cursor, catalog lookups, order search) and the
//! file-backed implementations used by the CLI and tests.

use crate::error::ExportError;
use crate::model::{Category, Order, Product};
use crate::ndjson::{count_records, for_each_record, read_all, NdjsonReader};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Streamed products in platform order.
///
/// Items that cannot be decoded come back as [`ExportError::Entity`]; anything else that
/// goes wrong while advancing is fatal for the run.
pub trait ProductCursor: Iterator<Item = Result<Product, ExportError>> {
    /// Number of products the cursor will visit; used for progress only.
    fn total_count(&self) -> u64;
}

/// Opens a fresh product cursor for one run.
pub trait ProductSource {
    fn open(&self) -> Result<Box<dyn ProductCursor + '_>>;
}

/// Random-access lookups the field derivation needs.
pub trait CatalogLookup {
    fn category(&self, id: &str) -> Option<Category>;
    fn product(&self, id: &str) -> Option<Product>;
}

/// Order query: orders created at or after `since` for `locale`, oldest first.
pub trait OrderSearch {
    fn search_orders<'a>(
        &'a self,
        since: OffsetDateTime,
        locale: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<Order>> + 'a>>;
}

// ----------------------------- In-memory ------------------------------------

/// Products held in memory; each `open()` replays them from the start.
#[derive(Clone, Debug, Default)]
pub struct MemoryProducts {
    products: Vec<Product>,
}

impl MemoryProducts {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

struct SliceCursor<'a> {
    iter: std::slice::Iter<'a, Product>,
    total: u64,
}

impl Iterator for SliceCursor<'_> {
    type Item = Result<Product, ExportError>;
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().cloned().map(Ok)
    }
}

impl ProductCursor for SliceCursor<'_> {
    fn total_count(&self) -> u64 {
        self.total
    }
}

impl ProductSource for MemoryProducts {
    fn open(&self) -> Result<Box<dyn ProductCursor + '_>> {
        Ok(Box::new(SliceCursor { iter: self.products.iter(), total: self.products.len() as u64 }))
    }
}

// ----------------------------- NDJSON files ------------------------------------

/// Products streamed from an NDJSON file (optionally `.zst`), one product per line.
#[derive(Clone, Debug)]
pub struct NdjsonProducts {
    path: PathBuf,
    read_buf_bytes: usize,
}

impl NdjsonProducts {
    pub fn new(path: impl AsRef<Path>, read_buf_bytes: usize) -> Self {
        Self { path: path.as_ref().to_path_buf(), read_buf_bytes }
    }
}

struct NdjsonCursor {
    rdr: NdjsonReader,
    buf: Vec<u8>,
    total: u64,
    done: bool,
}

impl Iterator for NdjsonCursor {
    type Item = Result<Product, ExportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rdr.next_record(&mut self.buf) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => Some(serde_json::from_slice::<Product>(&self.buf).map_err(|e| {
                ExportError::entity(format!("line {}", self.rdr.line_no()), e.to_string())
            })),
            Err(e) => {
                self.done = true;
                Some(Err(ExportError::Runtime(
                    anyhow::Error::new(e).context(format!("read product line {}", self.rdr.line_no() + 1)),
                )))
            }
        }
    }
}

impl ProductCursor for NdjsonCursor {
    fn total_count(&self) -> u64 {
        self.total
    }
}

impl ProductSource for NdjsonProducts {
    fn open(&self) -> Result<Box<dyn ProductCursor + '_>> {
        let total = count_records(&self.path, self.read_buf_bytes)?;
        let rdr = NdjsonReader::open(&self.path, self.read_buf_bytes)?;
        tracing::info!("Opened product feed {} ({} lines).", self.path.display(), total);
        Ok(Box::new(NdjsonCursor { rdr, buf: Vec::with_capacity(16 * 1024), total, done: false }))
    }
}

/// Categories and (optionally) products indexed by id.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    categories: HashMap<String, Category>,
    products: HashMap<String, Product>,
}

impl CatalogIndex {
    pub fn new(categories: Vec<Category>, products: Vec<Product>) -> Self {
        Self {
            categories: categories.into_iter().map(|c| (c.id.clone(), c)).collect(),
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn load(categories: Option<&Path>, products: Option<&Path>, read_buf_bytes: usize) -> Result<Self> {
        let cats = load_categories(categories, read_buf_bytes)?;
        let prods: Vec<Product> = match products {
            Some(p) => read_all(p, read_buf_bytes).with_context(|| format!("load products {}", p.display()))?,
            None => Vec::new(),
        };
        tracing::info!("Indexed {} categories and {} products.", cats.len(), prods.len());
        Ok(Self::new(cats, prods))
    }

    /// Like [`CatalogIndex::load`], but only keeps the products in `wanted` plus the masters
    /// of any kept variant. The product file is streamed, at most twice.
    pub fn load_referenced(
        categories: Option<&Path>,
        products: Option<&Path>,
        wanted: &HashSet<String>,
        read_buf_bytes: usize,
    ) -> Result<Self> {
        let cats = load_categories(categories, read_buf_bytes)?;
        let mut index = Self::new(cats, Vec::new());
        if let Some(path) = products {
            index.keep_products(path, wanted, read_buf_bytes)?;
            let masters: HashSet<String> = index
                .products
                .values()
                .filter_map(|p| p.master_id.clone())
                .filter(|m| !index.products.contains_key(m))
                .collect();
            if !masters.is_empty() {
                index.keep_products(path, &masters, read_buf_bytes)?;
            }
        }
        tracing::info!(
            "Indexed {} categories and {} of {} referenced products.",
            index.categories.len(),
            index.products.len(),
            wanted.len()
        );
        Ok(index)
    }

    fn keep_products(&mut self, path: &Path, ids: &HashSet<String>, read_buf_bytes: usize) -> Result<()> {
        let products = &mut self.products;
        for_each_record(path, read_buf_bytes, |p: Product| {
            if ids.contains(&p.id) {
                products.insert(p.id.clone(), p);
            }
        })
        .with_context(|| format!("load products {}", path.display()))?;
        Ok(())
    }
}

fn load_categories(path: Option<&Path>, read_buf_bytes: usize) -> Result<Vec<Category>> {
    match path {
        Some(p) => read_all(p, read_buf_bytes).with_context(|| format!("load categories {}", p.display())),
        None => Ok(Vec::new()),
    }
}

impl CatalogLookup for CatalogIndex {
    fn category(&self, id: &str) -> Option<Category> {
        self.categories.get(id).cloned()
    }

    fn product(&self, id: &str) -> Option<Product> {
        self.products.get(id).cloned()
    }
}

/// Orders held in memory, searched by locale and creation date.
#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    pub fn new(mut orders: Vec<Order>) -> Self {
        orders.sort_by_key(|o| o.creation_date);
        Self { orders }
    }

    pub fn load(path: &Path, read_buf_bytes: usize) -> Result<Self> {
        let orders: Vec<Order> =
            read_all(path, read_buf_bytes).with_context(|| format!("load orders {}", path.display()))?;
        Ok(Self::new(orders))
    }
}

impl OrderSearch for OrderBook {
    fn search_orders<'a>(
        &'a self,
        since: OffsetDateTime,
        locale: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<Order>> + 'a>> {
        let locale = locale.to_string();
        Ok(Box::new(
            self.orders
                .iter()
                .filter(move |o| o.creation_date >= since && o.customer_locale.as_deref() == Some(locale.as_str()))
                .cloned()
                .map(Ok),
        ))
    }
}

/// Orders streamed from an NDJSON file (optionally `.zst`) on every search. Only the
/// matches of the searched locale are held, sorted oldest first.
#[derive(Clone, Debug)]
pub struct NdjsonOrders {
    path: PathBuf,
    read_buf_bytes: usize,
}

impl NdjsonOrders {
    pub fn new(path: impl AsRef<Path>, read_buf_bytes: usize) -> Self {
        Self { path: path.as_ref().to_path_buf(), read_buf_bytes }
    }

    /// Ids of every product some line item points at.
    pub fn referenced_products(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for_each_record(&self.path, self.read_buf_bytes, |o: Order| {
            ids.extend(o.line_items.into_iter().filter_map(|li| li.product_id));
        })
        .with_context(|| format!("scan orders {}", self.path.display()))?;
        Ok(ids)
    }
}

impl OrderSearch for NdjsonOrders {
    fn search_orders<'a>(
        &'a self,
        since: OffsetDateTime,
        locale: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<Order>> + 'a>> {
        let mut matches = Vec::new();
        for_each_record(&self.path, self.read_buf_bytes, |o: Order| {
            if o.creation_date >= since && o.customer_locale.as_deref() == Some(locale) {
                matches.push(o);
            }
        })
        .with_context(|| format!("search orders {}", self.path.display()))?;
        matches.sort_by_key(|o| o.creation_date);
        tracing::debug!(locale = %locale, "{} orders since {}", matches.len(), since);
        Ok(Box::new(matches.into_iter().map(Ok)))
    }
}
