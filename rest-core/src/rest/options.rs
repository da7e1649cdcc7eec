//! Pagination, ordering and filter options decoded from a list request.

use crate::error::RestError;

pub const PAGE_PARAM: &str = "page";
pub const RESULTS_PARAM: &str = "results";
pub const ORDER_PARAM: &str = "order";

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    Exact,
    Like,
}

impl FilterOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessOrEqual => "<=",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::Exact => "=",
            FilterOperator::Like => "LIKE",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "lt" => Some(FilterOperator::LessThan),
            "gt" => Some(FilterOperator::GreaterThan),
            "lte" => Some(FilterOperator::LessOrEqual),
            "gte" => Some(FilterOperator::GreaterOrEqual),
            "like" => Some(FilterOperator::Like),
            _ => None,
        }
    }

    /// Splits a query key such as `created__gte` into field and operator.
    /// Keys without a recognised suffix are exact matches on the whole key.
    pub fn split_key(key: &str) -> (&str, FilterOperator) {
        if let Some((field, suffix)) = key.rsplit_once("__") {
            if !field.is_empty() {
                if let Some(op) = FilterOperator::from_suffix(suffix) {
                    return (field, op);
                }
            }
        }
        (key, FilterOperator::Exact)
    }
}

/// Value bound into a store predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Null,
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Exact, value)
    }

    /// `"null"` under Exact means IS NULL; numeric strings compare as
    /// integers except under LIKE, which always matches text.
    pub fn bind_value(&self) -> FilterValue {
        if self.operator == FilterOperator::Exact && self.value == "null" {
            return FilterValue::Null;
        }
        if self.operator != FilterOperator::Like {
            if let Ok(number) = self.value.parse::<i64>() {
                return FilterValue::Integer(number);
            }
        }
        FilterValue::Text(self.value.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub size: u32,
    pub order: Option<String>,
    pub descending: bool,
    pub filters: Vec<Filter>,
    pub property: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            order: None,
            descending: false,
            filters: Vec::new(),
            property: None,
        }
    }
}

impl ListOptions {
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    /// One row more than the page so callers can tell whether another page
    /// exists without counting.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.size) + 1
    }
}

/// Page-size policy applied while parsing list requests.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl Paging {
    /// Builds list options from decoded query pairs. Fails before any store
    /// access when `page`, `results` or `order` are malformed.
    pub fn parse(&self, query: &[(String, String)]) -> Result<ListOptions, RestError> {
        let mut opts = ListOptions {
            size: self.default_size,
            ..ListOptions::default()
        };

        if let Some(page) = first_value(query, PAGE_PARAM) {
            opts.page = page.parse::<u32>().map_err(|_| {
                RestError::field(
                    PAGE_PARAM,
                    format!("invalid page value: {}. page must be an integer", page),
                )
            })?;
        }

        if let Some(results) = first_value(query, RESULTS_PARAM) {
            let size = results.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                RestError::field(
                    RESULTS_PARAM,
                    format!(
                        "invalid result size value: {}. results must be a positive integer",
                        results
                    ),
                )
            })?;
            opts.size = size.min(self.max_size);
        }

        if let Some(order) = first_value(query, ORDER_PARAM) {
            let (field, descending) = parse_order(order)?;
            opts.order = field;
            opts.descending = descending;
        }

        opts.filters = query
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), PAGE_PARAM | RESULTS_PARAM | ORDER_PARAM))
            .map(|(key, value)| {
                let (field, operator) = FilterOperator::split_key(key);
                Filter::new(field, operator, value.as_str())
            })
            .collect();

        Ok(opts)
    }
}

fn first_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// `-field` is descending, `field` ascending, an empty value means unordered.
pub fn parse_order(value: &str) -> Result<(Option<String>, bool), RestError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok((None, false));
    }
    match value.strip_prefix('-') {
        Some("") => Err(RestError::field(ORDER_PARAM, "order requires a field name")),
        Some(field) => Ok((Some(field.to_string()), true)),
        None => Ok((Some(value.to_string()), false)),
    }
}

/// Decodes a raw query string, keeping repeated keys in order.
pub fn parse_query(raw: Option<&str>) -> Result<Vec<(String, String)>, RestError> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
            .map_err(|e| RestError::field("query", format!("unparsable query: {}", e))),
    }
}
