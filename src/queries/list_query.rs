//! In-memory filtering, searching, sorting and paging of document lists.
//!
//! Everything here is synchronous and side-effect free. The engine works on
//! any collection implementing [`DocumentRecord`], so invoices, quotations,
//! sales orders, proforma invoices and products share one code path.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::ServiceError;
use crate::models::DocumentRecord;

/// Sentinel accepted wherever a filter may be disabled.
pub const ALL: &str = "all";

/// Either no constraint or an exact-match constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Filter::All
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(expected) => expected == value,
        }
    }
}

impl<T> Filter<T> {
    /// Parses exactly `"all"` (or an empty string) as [`Filter::All`],
    /// anything else through `parse`. The value is not trimmed.
    pub fn parse_with<E>(raw: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> Result<Self, E> {
        if raw.is_empty() || raw == ALL {
            Ok(Filter::All)
        } else {
            parse(raw).map(Filter::Only)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }
}

/// Coarse amount ranges offered by the list filters.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum AmountBucket {
    /// `[0, 1000]`
    #[strum(serialize = "0-1000")]
    #[serde(rename = "0-1000")]
    UpTo1k,
    /// `(1000, 5000]`
    #[strum(serialize = "1000-5000")]
    #[serde(rename = "1000-5000")]
    From1kTo5k,
    /// `(5000, 10000]`
    #[strum(serialize = "5000-10000")]
    #[serde(rename = "5000-10000")]
    From5kTo10k,
    /// `(10000, inf)`
    #[strum(serialize = "10000+")]
    #[serde(rename = "10000+")]
    Over10k,
}

impl AmountBucket {
    pub fn contains(&self, amount: Decimal) -> bool {
        match self {
            AmountBucket::UpTo1k => amount >= Decimal::ZERO && amount <= dec!(1000),
            AmountBucket::From1kTo5k => amount > dec!(1000) && amount <= dec!(5000),
            AmountBucket::From5kTo10k => amount > dec!(5000) && amount <= dec!(10000),
            AmountBucket::Over10k => amount > dec!(10000),
        }
    }
}

/// Field a list is ordered by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SortField {
    CreatedAt,
    Number,
    CounterpartyName,
    Amount,
    Status,
    /// Due date, valid-until date or delivery date, per collection.
    SecondaryDate,
    /// A field the records do not have. Sorting by it keeps the input order.
    Other(String),
}

impl Default for SortField {
    fn default() -> Self {
        SortField::CreatedAt
    }
}

impl FromStr for SortField {
    type Err = Infallible;

    /// Accepts snake_case and camelCase names plus the per-collection names
    /// of the counterparty and secondary date fields.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim() {
            "created_at" | "createdAt" | "created" => SortField::CreatedAt,
            "number" | "name" | "sku" => SortField::Number,
            "counterparty_name" | "counterpartyName" | "customer_name" | "customerName"
            | "supplier_name" | "supplierName" => SortField::CounterpartyName,
            "amount" | "total" | "unit_price" | "unitPrice" => SortField::Amount,
            "status" => SortField::Status,
            "secondary_date" | "secondaryDate" | "due_date" | "dueDate" | "valid_until"
            | "validUntil" | "delivery_date" | "deliveryDate" => SortField::SecondaryDate,
            other => SortField::Other(other.to_string()),
        };
        Ok(field)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::CreatedAt => f.write_str("created_at"),
            SortField::Number => f.write_str("number"),
            SortField::CounterpartyName => f.write_str("counterparty_name"),
            SortField::Amount => f.write_str("amount"),
            SortField::Status => f.write_str("status"),
            SortField::SecondaryDate => f.write_str("secondary_date"),
            SortField::Other(name) => f.write_str(name),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// How `asc`/`desc` map onto the produced order.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortMode {
    /// `asc` puts the smallest value first.
    #[default]
    Conventional,
    /// The strict-greater-than-first comparator of older list screens: `asc`
    /// puts the largest value first and `desc` the smallest.
    Legacy,
}

/// Filter and sort parameters for one list view.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery<S> {
    /// Case-insensitive substring of the counterparty name or the number.
    pub search: String,
    pub status: Filter<S>,
    pub counterparty: Filter<String>,
    pub amount: Filter<AmountBucket>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub sort_mode: SortMode,
}

impl<S> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Filter::All,
            counterparty: Filter::All,
            amount: Filter::All,
            sort_field: SortField::CreatedAt,
            sort_direction: SortDirection::Desc,
            sort_mode: SortMode::Conventional,
        }
    }
}

/// Raw list parameters as they arrive from a view or query string.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListParams {
    #[serde(alias = "searchTerm")]
    pub search: Option<String>,
    #[serde(alias = "statusFilter")]
    pub status: Option<String>,
    #[serde(alias = "counterpartyFilter", alias = "customer")]
    pub counterparty: Option<String>,
    #[serde(alias = "amountBucket", alias = "amountFilter")]
    pub amount: Option<String>,
    #[serde(alias = "sort_field")]
    pub sort_field: Option<String>,
    #[serde(alias = "sort_direction")]
    pub sort_direction: Option<String>,
}

impl<S> ListQuery<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    pub fn with_status(mut self, status: S) -> Self {
        self.status = Filter::Only(status);
        self
    }

    pub fn with_counterparty(mut self, name: impl Into<String>) -> Self {
        self.counterparty = Filter::Only(name.into());
        self
    }

    pub fn with_amount(mut self, bucket: AmountBucket) -> Self {
        self.amount = Filter::Only(bucket);
        self
    }

    pub fn sort_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort_field = field;
        self.sort_direction = direction;
        self
    }

    pub fn with_sort_mode(mut self, mode: SortMode) -> Self {
        self.sort_mode = mode;
        self
    }

    /// True when no filter is active, so filtering returns its input.
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_empty()
            && self.status.is_all()
            && self.counterparty.is_all()
            && self.amount.is_all()
    }
}

impl<S> ListQuery<S>
where
    S: FromStr,
{
    /// Builds a query from string parameters. Missing values fall back to the
    /// defaults; an unknown sort field is kept as [`SortField::Other`].
    pub fn from_params(params: &ListParams) -> Result<Self, ServiceError> {
        let mut query = Self::default();

        if let Some(search) = &params.search {
            query.search = search.clone();
        }

        if let Some(status) = &params.status {
            query.status = Filter::parse_with(status, |raw| {
                S::from_str(raw)
                    .map_err(|_| ServiceError::InvalidInput(format!("Unknown status '{}'", raw)))
            })?;
        }

        if let Some(counterparty) = &params.counterparty {
            query.counterparty =
                Filter::parse_with(counterparty, |raw| Ok::<_, Infallible>(raw.to_string()))
                    .unwrap_or_default();
        }

        if let Some(amount) = &params.amount {
            query.amount = Filter::parse_with(amount, |raw| {
                AmountBucket::from_str(raw).map_err(|_| {
                    ServiceError::InvalidInput(format!("Unknown amount range '{}'", raw))
                })
            })?;
        }

        if let Some(field) = &params.sort_field {
            if !field.trim().is_empty() {
                query.sort_field = field.parse().unwrap_or_default();
            }
        }

        if let Some(direction) = &params.sort_direction {
            query.sort_direction = SortDirection::from_str(direction.trim()).map_err(|_| {
                ServiceError::InvalidInput(format!("Unknown sort direction '{}'", direction))
            })?;
        }

        Ok(query)
    }
}

impl<S: PartialEq> ListQuery<S> {
    /// True when the record passes every filter.
    pub fn matches<T>(&self, doc: &T) -> bool
    where
        T: DocumentRecord<Status = S>,
    {
        let needle = self.search.to_lowercase();
        self.matches_with_needle(doc, &needle)
    }

    fn matches_with_needle<T>(&self, doc: &T, needle: &str) -> bool
    where
        T: DocumentRecord<Status = S>,
    {
        let search_ok = needle.is_empty()
            || doc.counterparty_name().to_lowercase().contains(needle)
            || doc.number().to_lowercase().contains(needle);

        search_ok
            && self.status.matches(&doc.status())
            && match &self.counterparty {
                Filter::All => true,
                Filter::Only(name) => name == doc.counterparty_name(),
            }
            && match &self.amount {
                Filter::All => true,
                Filter::Only(bucket) => bucket.contains(doc.amount()),
            }
    }
}

/// Value a record contributes for one sort field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'a> {
    Text(Cow<'a, str>),
    Amount(Decimal),
    Timestamp(i64),
    Missing,
}

fn sort_key<'a, T: DocumentRecord>(doc: &'a T, field: &SortField) -> SortKey<'a> {
    match field {
        SortField::CreatedAt => SortKey::Timestamp(doc.created_at().timestamp_millis()),
        SortField::Number => SortKey::Text(Cow::Borrowed(doc.number())),
        SortField::CounterpartyName => SortKey::Text(Cow::Borrowed(doc.counterparty_name())),
        SortField::Amount => SortKey::Amount(doc.amount()),
        SortField::Status => SortKey::Text(Cow::Owned(doc.status().to_string())),
        SortField::SecondaryDate => doc
            .secondary_date()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| SortKey::Timestamp(midnight.and_utc().timestamp_millis()))
            .unwrap_or(SortKey::Missing),
        SortField::Other(_) => SortKey::Missing,
    }
}

/// Orders two records by `field`.
///
/// Records without a value for the field sort after all records that have
/// one, whatever the direction, and keep their relative order.
pub fn compare_documents<T: DocumentRecord>(
    a: &T,
    b: &T,
    field: &SortField,
    direction: SortDirection,
    mode: SortMode,
) -> Ordering {
    match (sort_key(a, field), sort_key(b, field)) {
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        (SortKey::Missing, _) => Ordering::Greater,
        (_, SortKey::Missing) => Ordering::Less,
        (left, right) => {
            let natural = left.cmp(&right);
            let descending = (direction == SortDirection::Desc) != (mode == SortMode::Legacy);
            if descending {
                natural.reverse()
            } else {
                natural
            }
        }
    }
}

/// Stable in-place sort.
pub fn sort_documents<T: DocumentRecord>(
    docs: &mut [T],
    field: &SortField,
    direction: SortDirection,
    mode: SortMode,
) {
    docs.sort_by(|a, b| compare_documents(a, b, field, direction, mode));
}

/// Records passing every filter of `query`, in input order.
pub fn filter_documents<T>(docs: &[T], query: &ListQuery<T::Status>) -> Vec<T>
where
    T: DocumentRecord + Clone,
{
    let needle = query.search.to_lowercase();
    docs.iter()
        .filter(|doc| query.matches_with_needle(*doc, &needle))
        .cloned()
        .collect()
}

/// Filters, then sorts by the query's field, direction and mode.
pub fn filter_and_sort_documents<T>(docs: &[T], query: &ListQuery<T::Status>) -> Vec<T>
where
    T: DocumentRecord + Clone,
{
    let mut result = filter_documents(docs, query);
    sort_documents(
        &mut result,
        &query.sort_field,
        query.sort_direction,
        query.sort_mode,
    );
    result
}

/// Sorted, de-duplicated counterparty names for the counterparty filter.
pub fn distinct_counterparties<T: DocumentRecord>(docs: &[T]) -> Vec<String> {
    docs.iter()
        .map(|doc| doc.counterparty_name())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Totals shown above a list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListSummary<S: Eq + std::hash::Hash> {
    pub count: usize,
    pub total_amount: Decimal,
    pub by_status: HashMap<S, usize>,
}

pub fn summarize<T: DocumentRecord>(docs: &[T]) -> ListSummary<T::Status> {
    let mut by_status = HashMap::new();
    let mut total_amount = Decimal::ZERO;
    for doc in docs {
        *by_status.entry(doc.status()).or_insert(0) += 1;
        total_amount += doc.amount();
    }
    ListSummary {
        count: docs.len(),
        total_amount,
        by_status,
    }
}

/// One page of a list. Pages are 1-indexed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Cuts `page` out of `items`. Page 0 is read as page 1 and `per_page` is
/// clamped to `1..=max_per_page`.
pub fn paginate<T>(items: Vec<T>, page: u64, per_page: u64, max_per_page: u64) -> Page<T> {
    let per_page = per_page.clamp(1, max_per_page.max(1));
    let page = page.max(1);
    let total = items.len() as u64;
    let total_pages = (total + per_page - 1) / per_page;
    let offset = (page - 1).saturating_mul(per_page);

    let items = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .collect();

    Page {
        items,
        total,
        page,
        per_page,
        total_pages,
    }
}
