//! `{name}` placeholder substitution from invoice metadata.
//!
//! A [`PlaceholderMap`] is a flat string table. Values are expanded on insert:
//! dates become `<name>_ymd` / `<name>_y_m_d`, lists and maps become
//! `<name>_<index|key>` entries, and empty values are dropped. Resolving a
//! template replaces every `{word}` token with its mapped value, or with an
//! empty string when the key is unknown.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::document::InvoiceDocument;

static PLACEHOLDER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// A value that can be inserted into a [`PlaceholderMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderValue {
    Absent,
    Text(String),
    Date(NaiveDate),
    /// Expanded as `<name>_0`, `<name>_1`, ...
    List(Vec<PlaceholderValue>),
    /// Expanded as `<name>_<key>`.
    Keyed(BTreeMap<String, PlaceholderValue>),
}

impl From<&str> for PlaceholderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PlaceholderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for PlaceholderValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<NaiveDate> for PlaceholderValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<PlaceholderValue>> From<Option<T>> for PlaceholderValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

impl<T: Into<PlaceholderValue>> From<Vec<T>> for PlaceholderValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PlaceholderValue>> From<BTreeMap<String, T>> for PlaceholderValue {
    fn from(values: BTreeMap<String, T>) -> Self {
        Self::Keyed(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Flat placeholder name → value table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderMap {
    table: BTreeMap<String, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from arbitrary name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PlaceholderValue>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.insert(name.as_ref(), value);
        }
        map
    }

    /// Build the standard document placeholder set.
    pub fn from_document(document: &InvoiceDocument) -> Self {
        let seller = &document.seller;
        let mut map = Self::new();
        map.insert("documentno", document.document_no.as_ref())
            .insert("documenttypecode", document.type_code.as_ref())
            .insert("documentdate", document.date)
            .insert("documentname", document.name.as_ref())
            .insert("documentlanguage", document.language.as_ref())
            .insert("documentinvoicecurrency", document.invoice_currency.as_ref())
            .insert("documenttaxcurrency", document.tax_currency.as_ref())
            .insert("documentspecifiedperiod", document.specified_period)
            .insert("documentsellerid", seller.ids.clone())
            .insert("documentsellerglobalid", seller.global_ids.clone())
            .insert("documentsellername", seller.name.as_ref())
            .insert("documentsellerdescription", seller.description.as_ref())
            .insert("documentselleraddrline1", seller.address_line_1.as_ref())
            .insert("documentselleraddrline2", seller.address_line_2.as_ref())
            .insert("documentselleraddrline3", seller.address_line_3.as_ref())
            .insert("documentsellerpostcode", seller.postcode.as_ref())
            .insert("documentsellercity", seller.city.as_ref())
            .insert("documentsellercountry", seller.country.as_ref())
            .insert("documentsellersubdiv", seller.subdivisions.clone());
        map
    }

    /// Insert `value` under `name`, expanding dates, lists and keyed maps.
    /// Empty names and empty values are ignored.
    pub fn insert(&mut self, name: &str, value: impl Into<PlaceholderValue>) -> &mut Self {
        if name.is_empty() {
            return self;
        }
        match value.into() {
            PlaceholderValue::Absent => {}
            PlaceholderValue::Text(text) => {
                if !text.is_empty() {
                    self.table.insert(name.to_string(), text);
                }
            }
            PlaceholderValue::Date(date) => {
                self.insert(&format!("{name}_ymd"), date.format("%Y%m%d").to_string());
                self.insert(&format!("{name}_y_m_d"), date.format("%Y-%m-%d").to_string());
            }
            PlaceholderValue::List(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    self.insert(&format!("{name}_{index}"), item);
                }
            }
            PlaceholderValue::Keyed(items) => {
                for (key, item) in items {
                    self.insert(&format!("{name}_{key}"), item);
                }
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Substitute every `{name}` token in `template`.
    pub fn resolve(&self, template: &str) -> String {
        PLACEHOLDER_TOKEN
            .replace_all(template, |caps: &Captures<'_>| {
                self.get(&caps[1]).unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

/// Resolve `template` against a document's placeholders.
///
/// The map is rebuilt on every call. Without a document all tokens resolve
/// to the empty string.
pub fn resolve_for_document(template: &str, document: Option<&InvoiceDocument>) -> String {
    match document {
        Some(document) => PlaceholderMap::from_document(document).resolve(template),
        None => PlaceholderMap::new().resolve(template),
    }
}
