mod config;
mod date;
mod error;
mod model;
mod ndjson;
mod record;
mod urls;

mod locale;
mod source;
mod derive;
mod writers;
mod progress;
mod util;
mod pipeline;

mod catalog;
mod orders;

pub use crate::config::{ExportOptions, JobParameters, SitePreferences, Storefront};
pub use crate::date::{days_before, format_feed_timestamp, parse_cutoff};
pub use crate::error::{ExportError, Outcome, RunResult, RunStats};
pub use crate::model::{Address, Category, LineItem, Money, Order, Product, ProductKind, Shipment, VariantSummary};

// locale/key registry
pub use crate::locale::{
    allowed_export_locales, credentials_for_locale, parse_locale_groups, resolve_active_groups, ActiveGroups,
    Credentials, LocaleGroup,
};

// platform seams and their file-backed implementations
pub use crate::source::{
    CatalogIndex, CatalogLookup, MemoryProducts, NdjsonOrders, NdjsonProducts, OrderBook, OrderSearch, ProductCursor,
    ProductSource,
};
pub use crate::ndjson::{count_records, for_each_record, is_zstd, read_all, NdjsonReader};
pub use crate::urls::{StorefrontUrls, UrlBuilder};

// field derivation and record layout
pub use crate::derive::{
    bundle_members, catalog_record, category_path_json, gtins, image_url, locale_data_json, localize, order_records,
    shared_catalog_fields, FieldContext, Gtins, LocalizedView, SharedFields, CATALOG_IMAGE_VIEWS, ORDER_IMAGE_VIEWS,
};
pub use crate::record::{header_line, tsv_line, CatalogRecord, FeedRecord, OrderRecord, CATALOG_FEED_HEADER, ORDER_FEED_HEADER};

// writers, driver and the two export steps
pub use crate::writers::{FeedTarget, FeedWriter, FileSinks, SinkFactory, WriterPool};
pub use crate::pipeline::{run_step, ChunkStep, StepStart};
pub use crate::catalog::{CatalogExport, ProductRows};
pub use crate::orders::{OrderExport, OrderMode, OrderWindow};

pub use crate::progress::{make_count_progress, ProgressScope};
pub use crate::util::init_tracing_once;
