//! Catalog feed export: one file per active locale group, one row per product and group.

use crate::config::{ExportOptions, JobParameters, SitePreferences};
use crate::derive::{catalog_record, shared_catalog_fields, FieldContext};
use crate::error::{ExportError, RunResult, RunStats};
use crate::locale::{resolve_active_groups, LocaleGroup};
use crate::model::Product;
use crate::pipeline::{run_step, ChunkStep, StepStart};
use crate::record::{header_line, FeedRecord, CATALOG_FEED_HEADER};
use crate::source::{CatalogLookup, ProductCursor, ProductSource};
use crate::urls::UrlBuilder;
use crate::writers::{FeedTarget, FileSinks, SinkFactory, WriterPool};
use anyhow::{anyhow, Context};

/// Rendered rows of one product, one per active group.
pub struct ProductRows {
    pub sku: String,
    /// (group id, tab-separated line)
    pub rows: Vec<(String, String)>,
}

/// Run-scoped state of one catalog export.
pub struct CatalogExport<'a, F: SinkFactory = FileSinks> {
    params: JobParameters,
    site: &'a SitePreferences,
    options: ExportOptions,
    source: &'a dyn ProductSource,
    fields: FieldContext<'a>,
    sinks: F,
    groups: Vec<LocaleGroup>,
    pool: Option<WriterPool<F>>,
    cursor: Option<Box<dyn ProductCursor + 'a>>,
}

impl<'a> CatalogExport<'a, FileSinks> {
    pub fn new(
        params: JobParameters,
        site: &'a SitePreferences,
        options: ExportOptions,
        source: &'a dyn ProductSource,
        lookup: &'a dyn CatalogLookup,
        urls: &'a dyn UrlBuilder,
    ) -> Self {
        let sinks = FileSinks { write_buffer_bytes: options.write_buffer_bytes };
        Self {
            params,
            site,
            options,
            source,
            fields: FieldContext { lookup, urls, default_locale: &site.default_locale },
            sinks,
            groups: Vec::new(),
            pool: None,
            cursor: None,
        }
    }
}

impl<'a, F: SinkFactory> CatalogExport<'a, F> {
    /// Swap the output sinks; must happen before the run starts.
    pub fn with_sinks<G: SinkFactory>(self, sinks: G) -> CatalogExport<'a, G> {
        CatalogExport {
            params: self.params,
            site: self.site,
            options: self.options,
            source: self.source,
            fields: self.fields,
            sinks,
            groups: Vec::new(),
            pool: None,
            cursor: None,
        }
    }

    /// Run the whole step with the configured chunk size.
    pub fn run(&mut self) -> RunResult {
        let chunk_size = self.options.chunk_size;
        let label = self.options.progress.then(|| {
            self.options.progress_label.clone().unwrap_or_else(|| "Export catalog".to_string())
        });
        run_step(self, chunk_size, label.as_deref())
    }

    /// Writer pool of the current run, if one was opened.
    pub fn writers(&self) -> Option<&WriterPool<F>> {
        self.pool.as_ref()
    }
}

impl<F: SinkFactory> ChunkStep for CatalogExport<'_, F> {
    type Item = Product;
    type Output = ProductRows;

    fn init(&mut self) -> Result<StepStart, ExportError> {
        if self.params.is_disabled {
            return Ok(StepStart::Finished(RunResult::disabled("Export Catalog job step is disabled.")));
        }
        let base_name = self.params.require_export_file_name()?.to_string();
        let configured = self.site.locale_groups()?;
        self.groups = resolve_active_groups(&configured, &self.site.allowed_locales).require_any()?;

        // Cursor before writers, so a source that cannot be opened leaves no files behind.
        let cursor = self.source.open().context("open product cursor")?;

        let target = FeedTarget::new(&self.options.export_root, base_name, self.site.site_id.clone());
        let pool = WriterPool::open(&self.groups, &target, &header_line(&CATALOG_FEED_HEADER), &self.sinks);
        let opened = pool.open_count();
        self.pool = Some(pool);
        if opened == 0 {
            return Err(ExportError::Runtime(anyhow!("no catalog feed file could be created")));
        }
        self.cursor = Some(cursor);
        tracing::info!("Catalog export started for {} locale groups.", opened);
        Ok(StepStart::Ready)
    }

    fn total_count(&self) -> u64 {
        self.cursor.as_ref().map_or(0, |c| c.total_count())
    }

    fn next(&mut self) -> Option<Result<Product, ExportError>> {
        self.cursor.as_mut()?.next()
    }

    fn transform(&mut self, product: Product) -> Result<Option<ProductRows>, ExportError> {
        if !self.site.use_variants && product.is_variant() {
            return Ok(None);
        }
        let shared = shared_catalog_fields(&product, &self.fields)?;
        let rows = self
            .groups
            .iter()
            .map(|group| {
                let record = catalog_record(&shared, &product, group, &self.fields);
                (group.id(), record.to_line())
            })
            .collect();
        Ok(Some(ProductRows { sku: shared.sku, rows }))
    }

    fn flush(&mut self, chunk: Vec<ProductRows>) -> Result<u64, ExportError> {
        let Some(pool) = self.pool.as_mut() else {
            return Err(ExportError::Runtime(anyhow!("flush before init")));
        };
        let mut written = 0u64;
        for group in &self.groups {
            let id = group.id();
            for product in &chunk {
                for (_, line) in product.rows.iter().filter(|(gid, _)| *gid == id) {
                    match pool.write(&id, line) {
                        Ok(()) if pool.is_open(&id) => written += 1,
                        Ok(()) => {}
                        Err(e) => {
                            tracing::error!(group = %id, sku = %product.sku, "dropping remaining rows for group: {}", e);
                        }
                    }
                }
            }
        }
        Ok(written)
    }

    fn close(&mut self, mut stats: RunStats, failure: Option<ExportError>) -> RunResult {
        self.cursor = None;
        let Some(pool) = self.pool.as_mut() else {
            return match failure {
                Some(e) => RunResult::from_error("FAILED Export Catalog", &e, stats),
                None => RunResult::success("Export Catalog had nothing to do.", stats),
            };
        };
        let closed = pool.close_all();
        stats.files = pool.paths();
        tracing::info!("Closed {} catalog feed files.", closed);

        if let Some(e) = failure {
            tracing::error!("catalog export aborted: {}", e);
            return RunResult::from_error("FAILED An exception occurred while exporting the catalog", &e, stats);
        }
        if !pool.failures().is_empty() {
            let groups: Vec<&str> = pool.failures().keys().map(String::as_str).collect();
            return RunResult::runtime(
                format!("Export Catalog failed for locale groups: {}", groups.join(", ")),
                stats,
            );
        }
        RunResult::success(
            format!(
                "Export Catalog was successful: {} products, {} rows, {} files.",
                stats.entities_read.saturating_sub(stats.entities_skipped),
                stats.records_written,
                stats.files.len()
            ),
            stats,
        )
    }
}
