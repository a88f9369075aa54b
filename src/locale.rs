//! Locale/credential registry: parses the site's key mapping into validated locale groups
//! and decides which of them take part in a run.

use crate::error::ExportError;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One credential unit: a site key, the locales it covers and its auth key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocaleGroup {
    pub key: String,
    /// Non-empty, in configured order.
    pub locales: Vec<String>,
    pub auth_key: Option<String>,
    pub domain: Option<String>,
}

impl LocaleGroup {
    /// Identifier used for the group's folder and file name ("en_US_fr_CA").
    pub fn id(&self) -> String {
        self.locales.join("_")
    }

    pub fn auth_key_present(&self) -> bool {
        self.auth_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn covers(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale)
    }
}

#[derive(Deserialize)]
struct RawKeyEntry {
    #[serde(default)]
    locales: String,
    #[serde(default, rename = "authKey")]
    auth_key: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

fn control_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\n\t]").expect("static regex"))
}

fn locale_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(default|[A-Za-z]{2,3}(_[A-Za-z0-9]{2,8})*)$").expect("static regex"))
}

/// Parse the site key JSON into locale groups.
///
/// Newlines and tabs are stripped before parsing (the preference is edited by hand).
/// Groups come back in the order the keys appear in the JSON.
/// Fails on invalid JSON, on a key without locales and on malformed locale codes.
pub fn parse_locale_groups(json: &str) -> Result<Vec<LocaleGroup>, ExportError> {
    let cleaned = control_ws().replace_all(json, "");
    let raw: Map<String, Value> = serde_json::from_str(&cleaned)
        .map_err(|e| ExportError::config(format!("TurnToSiteAuthKeyJSON is not valid: {e}")))?;

    let mut groups = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let entry: RawKeyEntry = serde_json::from_value(value)
            .map_err(|e| ExportError::config(format!("site key {key:?} is not valid: {e}")))?;
        let locales: Vec<String> = entry
            .locales
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if locales.is_empty() {
            return Err(ExportError::config(format!("site key {key:?} lists no locales")));
        }
        if let Some(bad) = locales.iter().find(|l| !locale_code().is_match(l)) {
            return Err(ExportError::config(format!("site key {key:?} has invalid locale {bad:?}")));
        }
        groups.push(LocaleGroup { key, locales, auth_key: entry.auth_key, domain: entry.domain });
    }
    Ok(groups)
}

/// Result of filtering configured groups against the site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveGroups {
    /// At least one group qualifies.
    Active(Vec<LocaleGroup>),
    NoActiveGroups,
}

impl ActiveGroups {
    pub fn groups(&self) -> &[LocaleGroup] {
        match self {
            ActiveGroups::Active(g) => g,
            ActiveGroups::NoActiveGroups => &[],
        }
    }

    /// Catalog semantics: no active group is a configuration error.
    pub fn require_any(self) -> Result<Vec<LocaleGroup>, ExportError> {
        match self {
            ActiveGroups::Active(g) => Ok(g),
            ActiveGroups::NoActiveGroups => Err(ExportError::config(
                "There are no allowed locales for a catalog export, check the site/auth keys \
                 configuration and the site level allowed locales.",
            )),
        }
    }
}

/// A group is active iff it carries a non-empty auth key and every one of its locales is
/// allowed on the site. Groups repeating an already active locale set are ignored.
pub fn resolve_active_groups(configured: &[LocaleGroup], site_allowed: &[String]) -> ActiveGroups {
    let mut seen = HashSet::new();
    let mut active = Vec::new();

    for group in configured {
        if !group.auth_key_present() {
            tracing::info!(key = %group.key, "locale group has no auth key; skipped");
            continue;
        }
        let missing: Vec<&str> = group
            .locales
            .iter()
            .filter(|l| !site_allowed.contains(l))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            tracing::info!(key = %group.key, missing = ?missing, "locale group not fully allowed on site; skipped");
            continue;
        }
        let id = group.id();
        if !seen.insert(id.clone()) {
            tracing::warn!(key = %group.key, group = %id, "locale set configured more than once; keeping the first");
            continue;
        }
        active.push(group.clone());
    }

    if active.is_empty() {
        ActiveGroups::NoActiveGroups
    } else {
        ActiveGroups::Active(active)
    }
}

/// Site-allowed locales (in site order) covered by some group with a non-empty auth key.
pub fn allowed_export_locales(configured: &[LocaleGroup], site_allowed: &[String]) -> Vec<String> {
    site_allowed
        .iter()
        .filter(|l| configured.iter().any(|g| g.auth_key_present() && g.covers(l)))
        .cloned()
        .collect()
}

/// Service credentials for one locale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub site_key: String,
    pub auth_key: String,
    pub domain: Option<String>,
}

/// Credentials of the first keyed group covering `locale`; `default_domain` fills in a
/// missing data-center URL.
pub fn credentials_for_locale(
    configured: &[LocaleGroup],
    locale: &str,
    default_domain: Option<&str>,
) -> Option<Credentials> {
    let group = configured.iter().find(|g| g.auth_key_present() && g.covers(locale))?;
    Some(Credentials {
        site_key: group.key.clone(),
        auth_key: group.auth_key.clone().unwrap_or_default(),
        domain: group.domain.clone().or_else(|| default_domain.map(str::to_string)),
    })
}
