//! Storefront URL generation.

use anyhow::{Context, Result};
use url::Url;

/// Builds absolute storefront links for feed records.
pub trait UrlBuilder {
    fn product_url(&self, product_id: &str, locale: &str) -> String;
    fn category_url(&self, category_id: &str, locale: &str) -> String;
}

/// Pipeline-style storefront links:
/// `<scheme>://<host>/on/demandware.store/Sites-<site>-Site/<locale>/Product-Show?pid=<id>`.
#[derive(Clone, Debug)]
pub struct StorefrontUrls {
    base: Url,
    site_segment: String,
}

impl StorefrontUrls {
    pub fn new(scheme: &str, host: &str, site_id: &str) -> Result<Self> {
        let base = Url::parse(&format!("{scheme}://{host}/"))
            .with_context(|| format!("invalid storefront {scheme}://{host}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("storefront {base} cannot carry a path");
        }
        Ok(Self { base, site_segment: format!("Sites-{site_id}-Site") })
    }

    fn pipeline_url(&self, locale: &str, pipeline: &str, param: &str, value: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["on", "demandware.store", self.site_segment.as_str(), locale, pipeline]);
        }
        url.query_pairs_mut().append_pair(param, value);
        url.to_string()
    }
}

impl UrlBuilder for StorefrontUrls {
    fn product_url(&self, product_id: &str, locale: &str) -> String {
        self.pipeline_url(locale, "Product-Show", "pid", product_id)
    }

    fn category_url(&self, category_id: &str, locale: &str) -> String {
        self.pipeline_url(locale, "Search-Show", "cgid", category_id)
    }
}
