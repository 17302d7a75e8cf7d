//! The query plan value and its extension-closure contract.
//!
//! Rather than building a WHERE clause and parameter vector directly for
//! one SQL dialect, the plan itself is the thing passed around: an opaque,
//! immutable value threaded through a chain of `fn(QueryPlan) -> QueryPlan`
//! closures so extensions return a new plan rather than mutating a shared
//! builder in place.

use serde_json::Value as JsonValue;

/// One leaf or combinator in a filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// `field IS NULL`.
    IsNull { field: String },
    /// `field IN (values)`.
    In { field: String, values: Vec<JsonValue> },
    /// `field = value OR field IS NULL` (tri-state false).
    FalseOrNull { field: String },
    /// `field = value`.
    Eq { field: String, value: JsonValue },
    /// `field = subject_id`, used by ownership-scoping disjunctions.
    OwnedBy { field: String, subject_id: String },
    And(Vec<WhereClause>),
    Or(Vec<WhereClause>),
}

impl WhereClause {
    pub fn and(self, other: WhereClause) -> WhereClause {
        match self {
            WhereClause::And(mut clauses) => {
                clauses.push(other);
                WhereClause::And(clauses)
            }
            first => WhereClause::And(vec![first, other]),
        }
    }
}

/// One sort key, in the order it should be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub descending: bool,
}

/// A dotted relation path to eagerly resolve alongside the primary rows,
/// with the set of sub-fields to project (empty = no restriction).
#[derive(Debug, Clone, PartialEq)]
pub struct EagerPath {
    pub path: String,
    pub sub_fields: Vec<String>,
}

/// The opaque, immutable query plan. Every extension closure takes a
/// `QueryPlan` by value and returns a (possibly identical) `QueryPlan`;
/// nothing downstream observes a partially-built plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    pub projection: Vec<String>,
    pub r#where: Option<WhereClause>,
    pub order: Vec<OrderTerm>,
    pub eager: Vec<EagerPath>,
    pub first: u32,
    pub offset: u32,
}

impl QueryPlan {
    pub fn new(first: u32, offset: u32) -> Self {
        Self {
            first,
            offset,
            ..Default::default()
        }
    }

    pub fn with_projection(mut self, fields: Vec<String>) -> Self {
        self.projection = fields;
        self
    }

    pub fn with_eager(mut self, path: EagerPath) -> Self {
        self.eager.push(path);
        self
    }

    pub fn with_order(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    /// Combine an additional where-clause with whatever is already present
    /// via `AND`, the only way a plan's filter grows.
    pub fn and_where(mut self, clause: WhereClause) -> Self {
        self.r#where = Some(match self.r#where {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }
}

/// A per-field extension: given the field name and the plan built so far,
/// optionally returns a replacement plan. The first extension in insertion
/// order that returns `Some` short-circuits the rest for that field.
pub type FieldExtension = Box<dyn Fn(&str, QueryPlan) -> Option<QueryPlan> + Send + Sync>;

/// A whole-filter extension: always runs, may augment the plan.
pub type FilterExtension = Box<dyn Fn(QueryPlan) -> QueryPlan + Send + Sync>;

/// A listing-query extension: runs after planning and may replace the plan
/// wholesale.
pub type ListingExtension = Box<dyn Fn(QueryPlan) -> QueryPlan + Send + Sync>;

/// The ordered extension chain attached to one model. Applied in insertion
/// order; none are reordered or deduplicated.
#[derive(Default)]
pub struct ExtensionChain {
    pub per_field: Vec<FieldExtension>,
    pub whole_filter: Vec<FilterExtension>,
    pub listing: Vec<ListingExtension>,
}

impl ExtensionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the per-field extensions for one field, short-circuiting on
    /// the first one that returns a modified plan.
    pub fn apply_field(&self, field: &str, plan: QueryPlan) -> QueryPlan {
        for ext in &self.per_field {
            if let Some(next) = ext(field, plan.clone()) {
                return next;
            }
        }
        plan
    }

    /// Apply every whole-filter extension, each folding over the previous
    /// result.
    pub fn apply_whole_filter(&self, plan: QueryPlan) -> QueryPlan {
        self.whole_filter.iter().fold(plan, |acc, ext| ext(acc))
    }

    /// Apply every listing extension, each permitted to replace the plan.
    pub fn apply_listing(&self, plan: QueryPlan) -> QueryPlan {
        self.listing.iter().fold(plan, |acc, ext| ext(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_where_combines_with_existing_clause() {
        let plan = QueryPlan::new(20, 0)
            .and_where(WhereClause::Eq {
                field: "phase".to_string(),
                value: JsonValue::String("draft".into()),
            })
            .and_where(WhereClause::IsNull {
                field: "archivedAt".to_string(),
            });

        match plan.r#where {
            Some(WhereClause::And(clauses)) => assert_eq!(clauses.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn field_extension_short_circuits_on_first_match() {
        let mut chain = ExtensionChain::new();
        chain.per_field.push(Box::new(|field, plan| {
            if field == "title" {
                Some(plan.with_projection(vec!["title_override".to_string()]))
            } else {
                None
            }
        }));
        chain.per_field.push(Box::new(|_field, plan| {
            Some(plan.with_projection(vec!["never_reached".to_string()]))
        }));

        let result = chain.apply_field("title", QueryPlan::new(20, 0));
        assert_eq!(result.projection, vec!["title_override".to_string()]);
    }

    #[test]
    fn whole_filter_extensions_all_run_in_order() {
        let mut chain = ExtensionChain::new();
        chain
            .whole_filter
            .push(Box::new(|plan| plan.with_order(OrderTerm { column: "a".into(), descending: false })));
        chain
            .whole_filter
            .push(Box::new(|plan| plan.with_order(OrderTerm { column: "b".into(), descending: true })));

        let result = chain.apply_whole_filter(QueryPlan::new(20, 0));
        assert_eq!(result.order.len(), 2);
        assert_eq!(result.order[0].column, "a");
        assert_eq!(result.order[1].column, "b");
    }
}
