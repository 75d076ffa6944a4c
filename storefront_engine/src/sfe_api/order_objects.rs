use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderStatusType};

/// Criteria for [`crate::traits::OrderManagement::search_orders`]. All criteria that are set must match. Results are
/// sorted by order date, oldest first unless [`Self::newest_first`] is called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_email: Option<String>,
    /// Case-insensitive text matched against the order id, customer name, email and address
    pub search_term: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub newest_first: bool,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_email<S: Into<String>>(mut self, email: S) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    pub fn with_search_term<S: Into<String>>(mut self, term: S) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Orders placed at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Orders placed strictly before `until`.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// True if no criteria are set. Sorting and limits are not criteria.
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_email.is_none() &&
            self.search_term.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(email) = &self.customer_email {
            write!(f, "customer_email: {email}. ")?;
        }
        if let Some(term) = &self.search_term {
            write!(f, "search: '{term}'. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(limit) = self.limit {
            write!(f, "limit: {limit}. ")?;
        }
        if self.newest_first {
            write!(f, "newest first.")?;
        }
        Ok(())
    }
}
