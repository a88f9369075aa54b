//! Feed schemas and their tab-separated line encoding.

pub const CATALOG_FEED_HEADER: [&str; 22] = [
    "SKU", "IMAGEURL", "TITLE", "PRICE", "CURRENCY", "ACTIVE", "ITEMURL", "CATEGORY", "KEYWORDS",
    "INSTOCK", "VIRTUALPARENTCODE", "CATEGORYPATHJSON", "MEMBERS", "BRAND", "MPN", "ISBN", "UPC",
    "EAN", "JAN", "ASIN", "MOBILEITEMURL", "LOCALEDATA",
];

pub const ORDER_FEED_HEADER: [&str; 17] = [
    "ORDERID", "ORDERDATE", "EMAIL", "ITEMTITLE", "ITEMURL", "ITEMLINEID", "ZIP", "FIRSTNAME",
    "LASTNAME", "SKU", "PRICE", "ITEMIMAGEURL", "TEASERSHOWN", "TEASERCLICKED", "DELIVERYDATE",
    "NICKNAME", "LOCALE",
];

pub fn header_line(columns: &[&str]) -> String {
    columns.join("\t")
}

/// Join fields with tabs. Tabs and line breaks inside a value become spaces so a value can
/// never shift columns or split a record.
pub fn tsv_line(fields: &[&str]) -> String {
    let mut out = String::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        out.extend(field.chars().map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c }));
    }
    out
}

/// A record with a fixed column order.
pub trait FeedRecord {
    fn fields(&self) -> Vec<&str>;

    fn to_line(&self) -> String {
        tsv_line(&self.fields())
    }
}

/// One catalog row for one (product, locale group) pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    pub sku: String,
    pub image_url: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    pub active: String,
    pub item_url: String,
    pub category: String,
    pub keywords: String,
    pub in_stock: String,
    pub virtual_parent_code: String,
    pub category_path_json: String,
    pub members: String,
    pub brand: String,
    pub mpn: String,
    pub isbn: String,
    pub upc: String,
    pub ean: String,
    pub jan: String,
    pub asin: String,
    pub mobile_item_url: String,
    pub locale_data: String,
}

impl FeedRecord for CatalogRecord {
    fn fields(&self) -> Vec<&str> {
        vec![
            self.sku.as_str(),
            self.image_url.as_str(),
            self.title.as_str(),
            self.price.as_str(),
            self.currency.as_str(),
            self.active.as_str(),
            self.item_url.as_str(),
            self.category.as_str(),
            self.keywords.as_str(),
            self.in_stock.as_str(),
            self.virtual_parent_code.as_str(),
            self.category_path_json.as_str(),
            self.members.as_str(),
            self.brand.as_str(),
            self.mpn.as_str(),
            self.isbn.as_str(),
            self.upc.as_str(),
            self.ean.as_str(),
            self.jan.as_str(),
            self.asin.as_str(),
            self.mobile_item_url.as_str(),
            self.locale_data.as_str(),
        ]
    }
}

/// One order row per product line item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: String,
    pub order_date: String,
    pub email: String,
    pub item_title: String,
    pub item_url: String,
    pub item_line_id: String,
    pub zip: String,
    pub first_name: String,
    pub last_name: String,
    pub sku: String,
    pub price: String,
    pub item_image_url: String,
    pub teaser_shown: String,
    pub teaser_clicked: String,
    pub delivery_date: String,
    pub nickname: String,
    pub locale: String,
}

impl FeedRecord for OrderRecord {
    fn fields(&self) -> Vec<&str> {
        vec![
            self.order_id.as_str(),
            self.order_date.as_str(),
            self.email.as_str(),
            self.item_title.as_str(),
            self.item_url.as_str(),
            self.item_line_id.as_str(),
            self.zip.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.sku.as_str(),
            self.price.as_str(),
            self.item_image_url.as_str(),
            self.teaser_shown.as_str(),
            self.teaser_clicked.as_str(),
            self.delivery_date.as_str(),
            self.nickname.as_str(),
            self.locale.as_str(),
        ]
    }
}
