//! Field derivation: pure functions from one product or order to feed records.

use crate::date::format_feed_timestamp;
use crate::error::ExportError;
use crate::locale::LocaleGroup;
use crate::model::{Order, Product, VariantSummary};
use crate::record::{CatalogRecord, OrderRecord};
use crate::source::CatalogLookup;
use crate::urls::UrlBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const CATALOG_IMAGE_VIEWS: [&str; 5] = ["hi-res", "large", "medium", "small", "swatch"];
pub const ORDER_IMAGE_VIEWS: [&str; 4] = ["large", "medium", "small", "swatch"];

/// Upper bound on category nesting; deeper chains are treated as corrupt.
const MAX_CATEGORY_DEPTH: usize = 64;

/// Run-scoped collaborators shared by every derivation call.
#[derive(Clone, Copy)]
pub struct FieldContext<'a> {
    pub lookup: &'a dyn CatalogLookup,
    pub urls: &'a dyn UrlBuilder,
    pub default_locale: &'a str,
}

/// Locale-specific projection of a product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizedView {
    pub locale: String,
    pub title: String,
}

/// Name lookup falls back from `xx_YY` to `xx`, then to the default-locale name.
pub fn localize(product: &Product, locale: &str) -> LocalizedView {
    let names = &product.localized_names;
    let language = locale.split('_').next().unwrap_or(locale);
    let title = names
        .get(locale)
        .or_else(|| names.get(language))
        .map(String::as_str)
        .or(product.name.as_deref())
        .unwrap_or("")
        .to_string();
    LocalizedView { locale: locale.to_string(), title }
}

/// First non-empty image across `views`, in order; empty string when none exists.
pub fn image_url(product: &Product, views: &[&str]) -> String {
    views
        .iter()
        .find_map(|view| product.first_image(view))
        .unwrap_or_default()
        .to_string()
}

#[derive(Serialize)]
struct CategoryLevel {
    id: String,
    name: String,
    url: String,
}

/// Root-to-leaf JSON array of the primary category's ancestry, root excluded.
/// Empty string when the product has no primary category below the root.
pub fn category_path_json(product: &Product, ctx: &FieldContext<'_>) -> String {
    let Some(primary) = product.primary_category.as_deref() else {
        return String::new();
    };
    let mut current = ctx.lookup.category(primary);
    if current.is_none() {
        tracing::warn!(product = %product.id, category = %primary, "primary category not found");
    }

    let mut levels = Vec::new();
    let mut seen = HashSet::new();
    while let Some(cat) = current {
        if cat.is_root() {
            break;
        }
        if levels.len() >= MAX_CATEGORY_DEPTH || !seen.insert(cat.id.clone()) {
            tracing::warn!(product = %product.id, category = %cat.id, "category chain loops or is too deep; truncated");
            break;
        }
        current = cat.parent.as_deref().and_then(|p| ctx.lookup.category(p));
        levels.push(CategoryLevel {
            url: ctx.urls.category_url(&cat.id, ctx.default_locale),
            name: cat.display_name.unwrap_or_default(),
            id: cat.id,
        });
    }

    if levels.is_empty() {
        return String::new();
    }
    levels.reverse();
    serde_json::to_string(&levels).unwrap_or_default()
}

/// Ids of the products contained in a bundle, in bundle order.
pub fn bundle_members(product: &Product) -> Vec<String> {
    if product.is_bundle() {
        product.bundled.clone()
    } else {
        Vec::new()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gtins {
    pub mpn: String,
    pub isbn: String,
    pub upc: String,
    pub ean: String,
    pub jan: String,
    pub asin: String,
}

/// Masters aggregate their variants' values, one comma-separated position per variant.
/// Everything else reports its own values. ISBN, JAN and ASIN are never collected.
pub fn gtins(product: &Product) -> Gtins {
    fn own(v: Option<&str>) -> String {
        v.map(str::trim).unwrap_or("").to_string()
    }
    fn per_variant(variants: &[VariantSummary], pick: impl Fn(&VariantSummary) -> Option<&str>) -> String {
        variants.iter().map(|v| own(pick(v))).collect::<Vec<_>>().join(",")
    }

    if product.is_master() && !product.variants.is_empty() {
        Gtins {
            mpn: per_variant(&product.variants, |v| v.manufacturer_sku.as_deref()),
            upc: per_variant(&product.variants, |v| v.upc.as_deref()),
            ean: per_variant(&product.variants, |v| v.ean.as_deref()),
            ..Gtins::default()
        }
    } else {
        Gtins {
            mpn: own(product.manufacturer_sku.as_deref()),
            upc: own(product.upc.as_deref()),
            ean: own(product.ean.as_deref()),
            ..Gtins::default()
        }
    }
}

#[inline]
pub fn yes_no(flag: bool) -> &'static str {
    if flag { "Y" } else { "N" }
}

/// Money value in its shortest decimal form ("20", "19.99").
pub fn format_price(value: f64) -> String {
    if value.is_finite() { value.to_string() } else { String::new() }
}

#[derive(Serialize)]
struct LocaleEntry {
    title: String,
    #[serde(rename = "itemUrl")]
    item_url: String,
    #[serde(rename = "mobileItemUrl")]
    mobile_item_url: String,
}

/// LOCALEDATA: locale -> {title, itemUrl, mobileItemUrl} for every locale of the group.
pub fn locale_data_json(product: &Product, locales: &[String], ctx: &FieldContext<'_>) -> String {
    let data: BTreeMap<&str, LocaleEntry> = locales
        .iter()
        .map(|locale| {
            let view = localize(product, locale);
            let url = ctx.urls.product_url(&product.id, locale);
            (locale.as_str(), LocaleEntry { title: view.title, item_url: url.clone(), mobile_item_url: url })
        })
        .collect();
    serde_json::to_string(&data).unwrap_or_default()
}

/// Catalog columns that do not depend on the locale group; computed once per product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedFields {
    pub sku: String,
    pub image_url: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    pub active: &'static str,
    pub item_url: String,
    pub keywords: String,
    pub in_stock: &'static str,
    pub virtual_parent_code: String,
    pub category_path_json: String,
    pub members: String,
    pub brand: String,
    pub gtins: Gtins,
}

pub fn shared_catalog_fields(product: &Product, ctx: &FieldContext<'_>) -> Result<SharedFields, ExportError> {
    let sku = product.id.trim();
    if sku.is_empty() {
        return Err(ExportError::entity("<no id>", "product has no id"));
    }
    let virtual_parent_code = if product.is_variant() {
        match product.master_id.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Err(ExportError::entity(sku, "variant has no master product")),
        }
    } else {
        String::new()
    };

    let (price, currency) = match &product.price {
        Some(m) => (format_price(m.value), m.currency.clone()),
        None => (String::new(), String::new()),
    };

    Ok(SharedFields {
        sku: sku.to_string(),
        image_url: image_url(product, &CATALOG_IMAGE_VIEWS),
        title: localize(product, ctx.default_locale).title,
        price,
        currency,
        active: yes_no(product.orderable),
        item_url: ctx.urls.product_url(sku, ctx.default_locale),
        keywords: product.page_keywords.clone().unwrap_or_default(),
        in_stock: yes_no(product.online),
        virtual_parent_code,
        category_path_json: category_path_json(product, ctx),
        members: bundle_members(product).join(","),
        brand: product.brand.clone().unwrap_or_default(),
        gtins: gtins(product),
    })
}

/// The record for one locale group: shared columns plus the group's LOCALEDATA.
pub fn catalog_record(
    shared: &SharedFields,
    product: &Product,
    group: &LocaleGroup,
    ctx: &FieldContext<'_>,
) -> CatalogRecord {
    CatalogRecord {
        sku: shared.sku.clone(),
        image_url: shared.image_url.clone(),
        title: shared.title.clone(),
        price: shared.price.clone(),
        currency: shared.currency.clone(),
        active: shared.active.to_string(),
        item_url: shared.item_url.clone(),
        category: String::new(),
        keywords: shared.keywords.clone(),
        in_stock: shared.in_stock.to_string(),
        virtual_parent_code: shared.virtual_parent_code.clone(),
        category_path_json: shared.category_path_json.clone(),
        members: shared.members.clone(),
        brand: shared.brand.clone(),
        mpn: shared.gtins.mpn.clone(),
        isbn: shared.gtins.isbn.clone(),
        upc: shared.gtins.upc.clone(),
        ean: shared.gtins.ean.clone(),
        jan: shared.gtins.jan.clone(),
        asin: shared.gtins.asin.clone(),
        mobile_item_url: String::new(),
        locale_data: locale_data_json(product, &group.locales, ctx),
    }
}

/// The product an order line reports: itself, or its master when variants are not exported.
fn line_item_product(product_id: &str, use_variants: bool, ctx: &FieldContext<'_>) -> Option<Result<Product, ExportError>> {
    let Some(product) = ctx.lookup.product(product_id) else {
        tracing::debug!(product = %product_id, "line item product no longer exists; skipped");
        return None;
    };
    if use_variants || !product.is_variant() {
        return Some(Ok(product));
    }
    let master = product
        .master_id
        .as_deref()
        .and_then(|m| ctx.lookup.product(m))
        .ok_or_else(|| ExportError::entity(product_id, "variant master product not found"));
    Some(master)
}

/// One record per product line item of `order`. Items without a product are left out;
/// items whose product cannot be resolved come back as entity errors.
pub fn order_records(
    order: &Order,
    locale: &str,
    use_variants: bool,
    ctx: &FieldContext<'_>,
) -> Vec<Result<OrderRecord, ExportError>> {
    let billing = order.billing_address.clone().unwrap_or_default();
    let order_date = format_feed_timestamp(order.creation_date);

    order
        .line_items
        .iter()
        .filter_map(|item| {
            let pid = item.product_id.as_deref()?;
            let product = match line_item_product(pid, use_variants, ctx)? {
                Ok(p) => p,
                Err(e) => return Some(Err(e)),
            };
            let delivery_date = item
                .shipment_id
                .as_deref()
                .and_then(|id| order.shipment(id))
                .map(|s| format_feed_timestamp(s.creation_date))
                .unwrap_or_default();

            Some(Ok(OrderRecord {
                order_id: order.order_no.clone(),
                order_date: order_date.clone(),
                email: order.customer_email.clone().unwrap_or_default(),
                item_title: localize(&product, locale).title,
                item_url: ctx.urls.product_url(&product.id, locale),
                item_line_id: String::new(),
                zip: billing.postal_code.clone().unwrap_or_default(),
                first_name: billing.first_name.clone().unwrap_or_default(),
                last_name: billing.last_name.clone().unwrap_or_default(),
                sku: product.id.clone(),
                price: item.adjusted_net_price.map(format_price).unwrap_or_default(),
                item_image_url: image_url(&product, &ORDER_IMAGE_VIEWS),
                teaser_shown: String::new(),
                teaser_clicked: String::new(),
                delivery_date,
                nickname: String::new(),
                locale: locale.to_string(),
            }))
        })
        .collect()
}
