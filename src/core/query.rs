//! Query parameters, allow-list resolution and pagination
//!
//! A request's query string is parsed into [`QueryParams`], then checked
//! against the handler's [`QuerySpec`] allow-lists to produce a [`StoreQuery`]
//! the entity store can execute.
//!
//! # Format
//!
//! ```text
//! GET /projects?filter[title]=alpha,beta&filter[status]=open
//!              &sort=-created_at,title
//!              &include=owner
//!              &fields[projects]=id,title&fields[owner]=name
//!              &append=summary
//!              &page=2&per_page=10&limit=50
//! ```
//!
//! The parameter names `filter`, `sort`, `include`, `fields` and `append` are
//! configurable through [`QueryParameterNames`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Hard default page size when neither the request nor the configuration set one
pub const DEFAULT_PER_PAGE: usize = 20;

/// Names of the query string parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameterNames {
    pub filter: String,
    pub sort: String,
    pub include: String,
    pub fields: String,
    pub append: String,
}

impl Default for QueryParameterNames {
    fn default() -> Self {
        Self {
            filter: "filter".to_string(),
            sort: "sort".to_string(),
            include: "include".to_string(),
            fields: "fields".to_string(),
            append: "append".to_string(),
        }
    }
}

/// Errors raised while parsing or resolving query parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Requested filter(s) `{}` are not allowed. Allowed filter(s) are `{}`.", .unknown.join(", "), .allowed.join(", "))]
    FilterNotAllowed {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Requested sort(s) `{}` are not allowed. Allowed sort(s) are `{}`.", .unknown.join(", "), .allowed.join(", "))]
    SortNotAllowed {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Requested include(s) `{}` are not allowed. Allowed include(s) are `{}`.", .unknown.join(", "), .allowed.join(", "))]
    IncludeNotAllowed {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Requested field(s) `{}` are not allowed. Allowed field(s) are `{}`.", .unknown.join(", "), .allowed.join(", "))]
    FieldNotAllowed {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Requested append(s) `{}` are not allowed. Allowed append(s) are `{}`.", .unknown.join(", "), .allowed.join(", "))]
    AppendNotAllowed {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Invalid value '{value}' for query parameter '{parameter}'")]
    InvalidParameter { parameter: String, value: String },
}

/// Query parameters of a single request
///
/// Only syntax is checked here; allow-lists are enforced by
/// [`QuerySpec::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub limit: Option<usize>,

    /// filter name → accepted values
    pub filters: IndexMap<String, Vec<String>>,

    /// Raw sort expressions (`-field` for descending)
    pub sorts: Vec<String>,

    pub includes: Vec<String>,

    /// resource key → fields; the bare `fields=` form uses the empty key
    pub fields: IndexMap<String, Vec<String>>,

    pub appends: Vec<String>,

    /// Every pair as received, kept to rebuild pagination links
    pub raw: Vec<(String, String)>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Split `name[key]` into `("name", Some("key"))`
fn bracketed(key: &str) -> (&str, Option<&str>) {
    match (key.find('['), key.ends_with(']')) {
        (Some(open), true) => (&key[..open], Some(&key[open + 1..key.len() - 1])),
        _ => (key, None),
    }
}

fn parse_count(parameter: &str, value: &str) -> Result<Option<usize>, QueryError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| QueryError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
        })
}

impl QueryParams {
    /// Parse decoded query string pairs
    pub fn parse(
        pairs: &[(String, String)],
        names: &QueryParameterNames,
    ) -> Result<Self, QueryError> {
        let mut params = QueryParams {
            raw: pairs.to_vec(),
            ..Default::default()
        };

        for (key, value) in pairs {
            let (name, inner) = bracketed(key);

            match (name, inner) {
                ("page", None) => params.page = parse_count("page", value)?,
                ("per_page", None) => params.per_page = parse_count("per_page", value)?,
                // `limit=0` means no cap
                ("limit", None) => {
                    params.limit = parse_count("limit", value)?.filter(|n| *n > 0)
                }
                (n, Some(field)) if n == names.filter => {
                    params
                        .filters
                        .entry(field.to_string())
                        .or_default()
                        .extend(split_list(value));
                }
                (n, None) if n == names.sort => params.sorts.extend(split_list(value)),
                (n, None) if n == names.include => params.includes.extend(split_list(value)),
                (n, inner) if n == names.fields => {
                    params
                        .fields
                        .entry(inner.unwrap_or_default().to_string())
                        .or_default()
                        .extend(split_list(value));
                }
                (n, None) if n == names.append => params.appends.extend(split_list(value)),
                _ => {}
            }
        }

        Ok(params)
    }

    /// Page number, at least 1
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Raw pairs except `page`, to be carried over into pagination links
    pub fn preserved_pairs(&self) -> Vec<(String, String)> {
        self.raw
            .iter()
            .filter(|(k, _)| k != "page")
            .cloned()
            .collect()
    }
}

/// How an allowed filter matches values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Case-insensitive substring match
    #[default]
    Partial,
    /// Equality on the textual form of the value
    Exact,
}

/// A filter the client is allowed to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedFilter {
    pub name: String,

    /// Field the filter applies to, defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default)]
    pub kind: FilterKind,
}

impl AllowedFilter {
    pub fn partial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: None,
            kind: FilterKind::Partial,
        }
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: None,
            kind: FilterKind::Exact,
        }
    }

    /// Map the filter onto a differently named field
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

/// A resolved filter: the entity matches when its field matches any value
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub kind: FilterKind,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub field: String,
    pub direction: SortDirection,
}

impl SortClause {
    /// Parse `field` or `-field`
    pub fn parse(expr: &str) -> Self {
        match expr.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                direction: SortDirection::Desc,
            },
            None => Self {
                field: expr.to_string(),
                direction: SortDirection::Asc,
            },
        }
    }
}

impl fmt::Display for SortClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{}", self.field),
            SortDirection::Desc => write!(f, "-{}", self.field),
        }
    }
}

/// Which parts of an entity are loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Own fields, empty means every field
    pub fields: Vec<String>,
    pub includes: Vec<String>,
    /// include name → fields of the included entity
    pub include_fields: IndexMap<String, Vec<String>>,
    pub appends: Vec<String>,
}

/// A validated query, ready for the entity store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub selection: Selection,
    pub filters: Vec<FilterClause>,
    pub sorts: Vec<SortClause>,
    /// Fixed equality constraints applied to every query
    pub where_clauses: Vec<(String, Value)>,
    /// Cap on the whole result set, applied before pagination
    pub limit: Option<usize>,
}

/// Allow-lists and defaults of a handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    pub allowed_includes: Vec<String>,
    pub allowed_filters: Vec<AllowedFilter>,
    pub allowed_sorts: Vec<String>,
    /// Own fields (`title`) or fields of includes (`owner.name`)
    pub allowed_fields: Vec<String>,
    pub allowed_appends: Vec<String>,
    pub default_sorts: Vec<String>,
    pub where_clauses: IndexMap<String, Value>,
}

fn reject_unknown<F>(
    requested: &[String],
    allowed: &[String],
    error: F,
) -> Result<(), QueryError>
where
    F: FnOnce(Vec<String>, Vec<String>) -> QueryError,
{
    let unknown: Vec<String> = requested
        .iter()
        .filter(|r| !allowed.contains(r))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(error(unknown, allowed.to_vec()))
    }
}

impl QuerySpec {
    /// Resolve the selection part only (fields, includes, appends)
    ///
    /// Used for single entity lookups, where filters and sorts are meaningless.
    pub fn resolve_selection(
        &self,
        params: &QueryParams,
        endpoint: &str,
    ) -> Result<Selection, QueryError> {
        reject_unknown(&params.includes, &self.allowed_includes, |unknown, allowed| {
            QueryError::IncludeNotAllowed { unknown, allowed }
        })?;
        reject_unknown(&params.appends, &self.allowed_appends, |unknown, allowed| {
            QueryError::AppendNotAllowed { unknown, allowed }
        })?;

        let mut selection = Selection {
            includes: params.includes.clone(),
            appends: params.appends.clone(),
            ..Default::default()
        };

        for (key, fields) in &params.fields {
            if key.is_empty() || key == endpoint {
                reject_unknown(fields, &self.allowed_fields, |unknown, allowed| {
                    QueryError::FieldNotAllowed { unknown, allowed }
                })?;
                selection.fields.extend(fields.iter().cloned());
            } else {
                let qualified: Vec<String> =
                    fields.iter().map(|f| format!("{}.{}", key, f)).collect();
                reject_unknown(&qualified, &self.allowed_fields, |unknown, allowed| {
                    QueryError::FieldNotAllowed { unknown, allowed }
                })?;
                selection
                    .include_fields
                    .entry(key.clone())
                    .or_default()
                    .extend(fields.iter().cloned());
            }
        }

        Ok(selection)
    }

    /// Resolve a full list query
    ///
    /// Requested sorts replace the default sorts; default sorts are trusted and
    /// not checked against the allow-list.
    pub fn resolve(&self, params: &QueryParams, endpoint: &str) -> Result<StoreQuery, QueryError> {
        let selection = self.resolve_selection(params, endpoint)?;

        let allowed_filter_names: Vec<String> =
            self.allowed_filters.iter().map(|f| f.name.clone()).collect();
        let requested_filters: Vec<String> = params.filters.keys().cloned().collect();
        reject_unknown(&requested_filters, &allowed_filter_names, |unknown, allowed| {
            QueryError::FilterNotAllowed { unknown, allowed }
        })?;

        let filters = params
            .filters
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .filter_map(|(name, values)| {
                self.allowed_filters
                    .iter()
                    .find(|f| &f.name == name)
                    .map(|allowed| FilterClause {
                        field: allowed.field().to_string(),
                        kind: allowed.kind,
                        values: values.clone(),
                    })
            })
            .collect();

        let sorts: Vec<SortClause> = if params.sorts.is_empty() {
            self.default_sorts.iter().map(|s| SortClause::parse(s)).collect()
        } else {
            let requested: Vec<SortClause> =
                params.sorts.iter().map(|s| SortClause::parse(s)).collect();
            let fields: Vec<String> = requested.iter().map(|s| s.field.clone()).collect();
            reject_unknown(&fields, &self.allowed_sorts, |unknown, allowed| {
                QueryError::SortNotAllowed { unknown, allowed }
            })?;
            requested
        };

        Ok(StoreQuery {
            selection,
            filters,
            sorts,
            where_clauses: self
                .where_clauses
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            limit: params.limit,
        })
    }
}

/// Which page to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Items to skip, saturating on huge page numbers
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of entities matching the query, across all pages
    pub total: usize,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

/// Paginated response structure: `{data, links, meta}`
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub links: PaginationLinks,
    pub meta: PaginationMeta,
}

/// Navigation links, each carrying the other query parameters of the request
#[derive(Debug, Serialize, PartialEq)]
pub struct PaginationLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Pagination metadata
#[derive(Debug, Serialize, PartialEq)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub current_page: usize,

    /// 1-based position of the first item on the page, None when empty
    pub from: Option<usize>,

    /// Last page number, at least 1
    pub last_page: usize,

    /// Collection path the links point to
    pub path: String,

    pub per_page: usize,

    /// 1-based position of the last item on the page, None when empty
    pub to: Option<usize>,

    /// Total number of items (after filters)
    pub total: usize,
}

impl PaginationMeta {
    pub fn new(path: &str, request: PageRequest, total: usize, count: usize) -> Self {
        let per_page = request.per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        let (from, to) = if count == 0 {
            (None, None)
        } else {
            let from = request.offset().saturating_add(1);
            (Some(from), Some(from.saturating_add(count - 1)))
        };

        Self {
            current_page: request.page,
            from,
            last_page,
            path: path.to_string(),
            per_page,
            to,
            total,
        }
    }
}

fn page_url(path: &str, preserved: &[(String, String)], page: usize) -> String {
    let mut pairs: Vec<(String, String)> = preserved.to_vec();
    pairs.push(("page".to_string(), page.to_string()));
    // encoding a Vec of string pairs cannot fail
    let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
    format!("{}?{}", path, query)
}

impl<T> PaginatedResponse<T> {
    /// Build the envelope for `page`, linking to `path`
    pub fn new(page: Page<T>, path: &str, preserved: &[(String, String)]) -> Self {
        let meta = PaginationMeta::new(path, page.request, page.total, page.items.len());
        let current = meta.current_page;

        let links = PaginationLinks {
            first: page_url(path, preserved, 1),
            last: page_url(path, preserved, meta.last_page),
            prev: (current > 1).then(|| page_url(path, preserved, current - 1)),
            next: (current < meta.last_page).then(|| page_url(path, preserved, current + 1)),
        };

        Self {
            data: page.items,
            links,
            meta,
        }
    }
}
