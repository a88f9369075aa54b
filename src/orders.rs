//! Order feed export: one file per allowed locale that has matching orders.

use crate::config::{ExportOptions, JobParameters, SitePreferences};
use crate::date::{days_before, parse_cutoff};
use crate::derive::{order_records, FieldContext};
use crate::error::{ExportError, RunResult, RunStats};
use crate::locale::{allowed_export_locales, credentials_for_locale, LocaleGroup};
use crate::model::Order;
use crate::record::{header_line, FeedRecord, ORDER_FEED_HEADER};
use crate::source::{CatalogLookup, OrderSearch};
use crate::urls::UrlBuilder;
use crate::writers::{FeedTarget, FeedWriter, FileSinks, SinkFactory};
use anyhow::Context;
use time::OffsetDateTime;

/// Which preference bounds the order search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderMode {
    /// Orders from the last `turntoHistoricalOrderDays` days.
    Rolling,
    /// Orders created on or after `turntoHistoricalOrderDate`.
    ByDate,
}

impl OrderMode {
    fn step_name(self) -> &'static str {
        match self {
            OrderMode::Rolling => "Export Orders",
            OrderMode::ByDate => "Export Orders by Date",
        }
    }
}

/// Resolved lower bound of the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderWindow {
    RollingDays(u32),
    Since(OffsetDateTime),
}

impl OrderWindow {
    pub fn cutoff(self, now: OffsetDateTime) -> Result<OffsetDateTime, ExportError> {
        match self {
            OrderWindow::RollingDays(days) => days_before(now, days).ok_or_else(|| {
                ExportError::config(format!(
                    "Mandatory site preference \"turntoHistoricalOrderDays\" is out of range: {days}"
                ))
            }),
            OrderWindow::Since(ts) => Ok(ts),
        }
    }
}

struct Plan {
    target: FeedTarget,
    groups: Vec<LocaleGroup>,
    locales: Vec<String>,
    since: OffsetDateTime,
}

/// Run-scoped state of one order export.
pub struct OrderExport<'a, F: SinkFactory = FileSinks> {
    params: JobParameters,
    site: &'a SitePreferences,
    options: ExportOptions,
    orders: &'a dyn OrderSearch,
    fields: FieldContext<'a>,
    sinks: F,
    mode: OrderMode,
    now: Option<OffsetDateTime>,
}

impl<'a> OrderExport<'a, FileSinks> {
    fn new(
        mode: OrderMode,
        params: JobParameters,
        site: &'a SitePreferences,
        options: ExportOptions,
        orders: &'a dyn OrderSearch,
        lookup: &'a dyn CatalogLookup,
        urls: &'a dyn UrlBuilder,
    ) -> Self {
        let sinks = FileSinks { write_buffer_bytes: options.write_buffer_bytes };
        Self {
            params,
            site,
            options,
            orders,
            fields: FieldContext { lookup, urls, default_locale: &site.default_locale },
            sinks,
            mode,
            now: None,
        }
    }

    /// Orders created within the last `turntoHistoricalOrderDays` days.
    pub fn rolling(
        params: JobParameters,
        site: &'a SitePreferences,
        options: ExportOptions,
        orders: &'a dyn OrderSearch,
        lookup: &'a dyn CatalogLookup,
        urls: &'a dyn UrlBuilder,
    ) -> Self {
        Self::new(OrderMode::Rolling, params, site, options, orders, lookup, urls)
    }

    /// Orders created on or after `turntoHistoricalOrderDate`.
    pub fn by_date(
        params: JobParameters,
        site: &'a SitePreferences,
        options: ExportOptions,
        orders: &'a dyn OrderSearch,
        lookup: &'a dyn CatalogLookup,
        urls: &'a dyn UrlBuilder,
    ) -> Self {
        Self::new(OrderMode::ByDate, params, site, options, orders, lookup, urls)
    }
}

impl<'a, F: SinkFactory> OrderExport<'a, F> {
    /// Pin "now" for the rolling window instead of reading the clock.
    pub fn with_reference_time(mut self, now: OffsetDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_sinks<G: SinkFactory>(self, sinks: G) -> OrderExport<'a, G> {
        OrderExport {
            params: self.params,
            site: self.site,
            options: self.options,
            orders: self.orders,
            fields: self.fields,
            sinks,
            mode: self.mode,
            now: self.now,
        }
    }

    pub fn mode(&self) -> OrderMode {
        self.mode
    }

    /// The configured window. Errors when the preference the mode needs is missing or invalid.
    pub fn window(&self) -> Result<OrderWindow, ExportError> {
        match self.mode {
            OrderMode::Rolling => self
                .site
                .historical_order_days
                .map(OrderWindow::RollingDays)
                .ok_or_else(|| ExportError::config("Mandatory site preference \"turntoHistoricalOrderDays\" is missing")),
            OrderMode::ByDate => {
                let raw = self
                    .site
                    .historical_order_date
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        ExportError::config("Mandatory site preference \"turntoHistoricalOrderDate\" is missing")
                    })?;
                parse_cutoff(raw).map(OrderWindow::Since).map_err(|e| {
                    ExportError::config(format!("Site preference \"turntoHistoricalOrderDate\" is invalid: {e}"))
                })
            }
        }
    }

    fn plan(&self) -> Result<Plan, ExportError> {
        let base_name = self.params.require_export_file_name()?.to_string();
        let window = self.window()?;
        let groups = self.site.locale_groups()?;
        let locales = allowed_export_locales(&groups, &self.site.allowed_locales);
        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        Ok(Plan {
            target: FeedTarget::new(&self.options.export_root, base_name, self.site.site_id.clone()),
            groups,
            locales,
            since: window.cutoff(now)?,
        })
    }

    /// Export every allowed locale. Disabled runs return OK without touching anything.
    pub fn run(&mut self) -> RunResult {
        let step = self.mode.step_name();
        if self.params.is_disabled {
            return RunResult::disabled("Step disabled, skip it...");
        }
        let plan = match self.plan() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("{} initialisation failed: {}", step, e);
                return RunResult::from_error("FAILED during initialisation", &e, RunStats::default());
            }
        };
        tracing::info!("{}: {} locales, orders since {}.", step, plan.locales.len(), plan.since);

        let mut stats = RunStats::default();
        let mut failed = Vec::new();
        for locale in &plan.locales {
            match self.export_locale(&plan, locale, &mut stats) {
                Ok(()) => {}
                Err(e) if e.is_resource() => {
                    tracing::error!(locale = %locale, "order feed failed: {}", e);
                    failed.push(locale.as_str());
                }
                Err(e) => {
                    tracing::error!(locale = %locale, "{} aborted: {}", step, e);
                    return RunResult::from_error(
                        &format!("FAILED An exception occurred during {step}"),
                        &e,
                        stats,
                    );
                }
            }
        }

        if !failed.is_empty() {
            return RunResult::runtime(format!("{step} failed for locales: {}", failed.join(", ")), stats);
        }
        RunResult::success(format!("{step} was successful."), stats)
    }

    fn export_locale(&self, plan: &Plan, locale: &str, stats: &mut RunStats) -> Result<(), ExportError> {
        match credentials_for_locale(&plan.groups, locale, self.site.default_data_center_url.as_deref()) {
            Some(c) => tracing::debug!(locale = %locale, site_key = %c.site_key, domain = ?c.domain, "using credentials"),
            None => tracing::debug!(locale = %locale, "no credentials for locale"),
        }

        let mut found = self
            .orders
            .search_orders(plan.since, locale)
            .with_context(|| format!("search orders for {locale}"))?;
        let first = match found.next() {
            None => {
                tracing::info!(locale = %locale, "no orders; no file written");
                return Ok(());
            }
            Some(order) => order.with_context(|| format!("read orders for {locale}"))?,
        };

        let path = plan.target.path_for(locale);
        let mut writer = FeedWriter::create(&self.sinks, path, &header_line(&ORDER_FEED_HEADER))?;
        stats.files.push(writer.path().to_path_buf());

        let orders = std::iter::once(Ok(first)).chain(found);
        let streamed = self.stream_orders(orders, locale, &mut writer, stats);
        let closed = writer.close();
        streamed?;
        closed?;
        tracing::info!(locale = %locale, "wrote {} order lines to {}", writer.lines_written(), writer.path().display());
        Ok(())
    }

    fn stream_orders<I, W>(&self, orders: I, locale: &str, writer: &mut FeedWriter<W>, stats: &mut RunStats) -> Result<(), ExportError>
    where
        I: Iterator<Item = anyhow::Result<Order>>,
        W: std::io::Write,
    {
        for order in orders {
            let order = order.with_context(|| format!("read orders for {locale}"))?;
            stats.entities_read += 1;
            for record in order_records(&order, locale, self.site.use_variants, &self.fields) {
                match record {
                    Ok(r) => {
                        writer.write_line(&r.to_line())?;
                        stats.records_written += 1;
                    }
                    Err(e) if e.is_entity() => {
                        tracing::warn!(order = %order.order_no, "skipping line item: {}", e);
                        stats.entities_skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}
