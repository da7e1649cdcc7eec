//! In-memory store for tests and local runs.
//!
//! Not durable: all state is lost on restart. Filters, ordering and paging
//! follow the same rules as the Postgres list query so both backends page
//! identically.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rest_core::rest::{Filter, FilterOperator, FilterValue, ListOptions};
use rest_core::sql::to_column_name;
use rest_core::Permission;
use tokio::sync::RwLock;

use super::{
    ServiceAccountChanges, ServiceAccountStore, Store, StoreError, StoreResult, UserStore,
};
use crate::models::{ServiceAccount, User};

#[derive(Default)]
pub struct MemoryStore {
    service_accounts: RwLock<BTreeMap<String, ServiceAccount>>,
    users: RwLock<BTreeMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users are provisioned out of band; this seeds one directly.
    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Conflict(format!("user {}", user.username)));
        }
        if let Some(token) = user.token.as_deref() {
            if users.values().any(|u| u.token.as_deref() == Some(token)) {
                return Err(StoreError::Conflict("user token".into()));
            }
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }
}

/// Column value as compared by list filters.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Null,
    Integer(i64),
    Text(String),
}

impl Cell {
    fn text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Integer(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// `timestamptz::text` in a UTC session: microseconds, trailing zeros
/// trimmed, `+00` offset.
fn timestamp_text(at: &DateTime<Utc>) -> String {
    let mut text = at.format("%Y-%m-%d %H:%M:%S").to_string();
    let micros = at.timestamp_subsec_micros();
    if micros > 0 {
        let fraction = format!("{:06}", micros);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text.push_str("+00");
    text
}

fn cell(account: &ServiceAccount, column: &str) -> Option<Cell> {
    let value = match column {
        "label" => Cell::Text(account.label.clone()),
        "description" => Cell::Text(account.description.clone()),
        "token" => account.token.clone().map(Cell::Text).unwrap_or(Cell::Null),
        "ip_restrictions" => Cell::Text(account.ip_restrictions.clone()),
        "permission" => Cell::Integer(account.permission.to_storage()),
        "created" => Cell::Text(timestamp_text(&account.created)),
        _ => return None,
    };
    Some(value)
}

fn compare(operator: FilterOperator, ordering: Ordering) -> bool {
    match operator {
        FilterOperator::LessThan => ordering == Ordering::Less,
        FilterOperator::GreaterThan => ordering == Ordering::Greater,
        FilterOperator::LessOrEqual => ordering != Ordering::Greater,
        FilterOperator::GreaterOrEqual => ordering != Ordering::Less,
        FilterOperator::Exact | FilterOperator::Like => ordering == Ordering::Equal,
    }
}

/// SQL `LIKE`: `%` matches any run, `_` one character.
fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn satisfies(account: &ServiceAccount, filter: &Filter) -> bool {
    let Some(value) = cell(account, &to_column_name(&filter.field)) else {
        return false;
    };

    match (filter.bind_value(), &value) {
        (FilterValue::Null, cell) => *cell == Cell::Null,
        (_, Cell::Null) => false,
        (FilterValue::Integer(wanted), Cell::Integer(actual)) => {
            compare(filter.operator, actual.cmp(&wanted))
        }
        (_, cell) => {
            let actual = cell.text().unwrap_or_default();
            if filter.operator == FilterOperator::Like {
                like(&filter.value, &actual)
            } else {
                compare(filter.operator, actual.as_str().cmp(filter.value.as_str()))
            }
        }
    }
}

/// Ascending order with NULLs last, as Postgres sorts.
fn order_cells(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Null, Cell::Null) => Ordering::Equal,
        (Cell::Null, _) => Ordering::Greater,
        (_, Cell::Null) => Ordering::Less,
        (Cell::Integer(x), Cell::Integer(y)) => x.cmp(y),
        (x, y) => x.text().cmp(&y.text()),
    }
}

#[async_trait]
impl ServiceAccountStore for MemoryStore {
    async fn find_service_account(&self, label: &str) -> StoreResult<ServiceAccount> {
        self.service_accounts
            .read()
            .await
            .get(label)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))
    }

    async fn find_service_account_by_token(&self, token: &str) -> StoreResult<ServiceAccount> {
        self.service_accounts
            .read()
            .await
            .values()
            .find(|account| account.token.as_deref() == Some(token))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("service account token".into()))
    }

    async fn list_service_accounts(&self, opts: &ListOptions) -> StoreResult<Vec<ServiceAccount>> {
        let accounts = self.service_accounts.read().await;
        let mut selected: Vec<&ServiceAccount> = accounts
            .values()
            .filter(|account| opts.filters.iter().all(|f| satisfies(account, f)))
            .collect();

        // BTreeMap iteration is already label order; sort_by is stable
        if let Some(column) = opts.order.as_deref().map(to_column_name) {
            if column != "label" || opts.descending {
                selected.sort_by(|a, b| {
                    let (Some(x), Some(y)) = (cell(a, &column), cell(b, &column)) else {
                        return Ordering::Equal;
                    };
                    let primary = order_cells(&x, &y);
                    if opts.descending {
                        primary.reverse()
                    } else {
                        primary
                    }
                });
            }
        }

        Ok(selected
            .into_iter()
            .skip(opts.offset() as usize)
            .take(opts.fetch_limit() as usize)
            .cloned()
            .collect())
    }

    async fn insert_service_account(&self, account: &ServiceAccount) -> StoreResult<()> {
        let mut accounts = self.service_accounts.write().await;
        if accounts.contains_key(&account.label) {
            return Err(StoreError::Conflict(format!("service account {}", account.label)));
        }
        if let Some(token) = account.token.as_deref() {
            if accounts.values().any(|a| a.token.as_deref() == Some(token)) {
                return Err(StoreError::Conflict("service account token".into()));
            }
        }
        accounts.insert(account.label.clone(), account.clone());
        Ok(())
    }

    async fn update_service_account(
        &self,
        label: &str,
        expected: Permission,
        changes: &ServiceAccountChanges,
    ) -> StoreResult<ServiceAccount> {
        let mut accounts = self.service_accounts.write().await;
        let stored = accounts
            .get_mut(label)
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))?;
        if stored.permission != expected {
            return Err(StoreError::Conflict(format!(
                "service account {} permissions changed",
                label
            )));
        }

        stored.description = changes.description.clone();
        stored.ip_restrictions = changes.ip_restrictions.clone();
        stored.permission = changes.permission;
        Ok(stored.clone())
    }

    async fn set_service_account_token(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> StoreResult<ServiceAccount> {
        let mut accounts = self.service_accounts.write().await;
        if let Some(token) = token {
            if accounts
                .values()
                .any(|a| a.label != label && a.token.as_deref() == Some(token))
            {
                return Err(StoreError::Conflict("service account token".into()));
            }
        }

        let stored = accounts
            .get_mut(label)
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))?;
        stored.token = token.map(str::to_string);
        Ok(stored.clone())
    }

    async fn delete_service_account(&self, label: &str) -> StoreResult<()> {
        self.service_accounts
            .write()
            .await
            .remove(label)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("service account {}", label)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_token(&self, token: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.token.as_deref() == Some(token))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user token".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
