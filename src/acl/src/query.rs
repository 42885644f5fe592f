//! Bulk query handle that access filters are applied onto

use crate::predicate::Predicate;
use crate::types::Resource;
use serde::{Deserialize, Serialize};

/// A query over all resources of one type, narrowed by a filter predicate.
///
/// The access control service never executes queries; it only appends the
/// compiled filter. Hosts translate [`Query::predicate`] into their own query
/// language, or run it over in-memory collections with [`Query::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    resource_type: String,
    filter: Predicate,
}

impl Query {
    /// Unrestricted query over a resource type
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filter: Predicate::True,
        }
    }

    /// Conjoin a predicate onto the current filter
    pub fn and_where(mut self, predicate: Predicate) -> Self {
        let current = std::mem::replace(&mut self.filter, Predicate::True);
        self.filter = current.and(predicate);
        self
    }

    /// Resource type this query runs over
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Accumulated filter
    pub fn predicate(&self) -> &Predicate {
        &self.filter
    }

    /// Rendered `WHERE` fragment
    pub fn where_clause(&self) -> String {
        self.filter.to_string()
    }

    /// Whether a single resource satisfies the query
    pub fn matches(&self, resource: &Resource) -> bool {
        resource.resource_type == self.resource_type && self.filter.matches(resource)
    }

    /// Run the query over an in-memory collection
    pub fn apply<'a, I>(&self, resources: I) -> Vec<&'a Resource>
    where
        I: IntoIterator<Item = &'a Resource>,
    {
        resources.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_where_accumulates() {
        let query = Query::new("ticket")
            .and_where(Predicate::eq("status", "open"))
            .and_where(Predicate::eq("owner_id", 42));

        assert_eq!(query.resource_type(), "ticket");
        assert_eq!(query.where_clause(), "status = 'open' AND owner_id = 42");
    }

    #[test]
    fn test_apply_filters_by_type_and_predicate() {
        let open = Resource::new("ticket").with_attribute("status", "open");
        let closed = Resource::new("ticket").with_attribute("status", "closed");
        let invoice = Resource::new("invoice").with_attribute("status", "open");
        let all = vec![open.clone(), closed, invoice];

        let query = Query::new("ticket").and_where(Predicate::eq("status", "open"));
        let matched = query.apply(&all);

        assert_eq!(matched, vec![&open]);
    }
}
