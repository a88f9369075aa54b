//! Read-only source entities as the commerce platform hands them to the exporter.
//!
//! The shapes double as the NDJSON line format read by the file-backed sources, so every
//! optional attribute defaults when absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    #[default]
    Standard,
    Master,
    Variant,
    VariationGroup,
    Bundle,
    Set,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: f64,
    pub currency: String,
}

/// GTIN-bearing view of one variant, embedded in its master so masters stream standalone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSummary {
    pub id: String,
    pub manufacturer_sku: Option<String>,
    pub upc: Option<String>,
    pub ean: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: String,
    pub kind: ProductKind,
    /// Name in the site's default locale.
    pub name: Option<String>,
    pub localized_names: BTreeMap<String, String>,
    pub master_id: Option<String>,
    pub variants: Vec<VariantSummary>,
    /// Contained product ids, bundles only.
    pub bundled: Vec<String>,
    pub primary_category: Option<String>,
    /// View type ("hi-res", "large", ...) -> absolute image URLs.
    pub images: BTreeMap<String, Vec<String>>,
    pub price: Option<Money>,
    pub orderable: bool,
    pub online: bool,
    pub brand: Option<String>,
    pub page_keywords: Option<String>,
    pub manufacturer_sku: Option<String>,
    pub upc: Option<String>,
    pub ean: Option<String>,
}

impl Product {
    pub fn is_variant(&self) -> bool {
        self.kind == ProductKind::Variant
    }

    pub fn is_master(&self) -> bool {
        self.kind == ProductKind::Master
    }

    pub fn is_bundle(&self) -> bool {
        self.kind == ProductKind::Bundle
    }

    /// First non-blank image URL registered under `view`.
    pub fn first_image(&self, view: &str) -> Option<&str> {
        self.images
            .get(view)?
            .iter()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: String,
    pub display_name: Option<String>,
    pub parent: Option<String>,
    pub root: bool,
}

impl Category {
    /// The catalog root is flagged explicitly or is the one category without a parent.
    pub fn is_root(&self) -> bool {
        self.root || self.parent.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub postal_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    /// `None` when the product was deleted after the order was placed.
    pub product_id: Option<String>,
    pub adjusted_net_price: Option<f64>,
    pub shipment_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_no: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_locale: Option<String>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub shipments: Vec<Shipment>,
}

impl Order {
    pub fn shipment(&self, id: &str) -> Option<&Shipment> {
        self.shipments.iter().find(|s| s.id == id)
    }
}
