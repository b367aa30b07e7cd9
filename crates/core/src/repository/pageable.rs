// Pageable query engine
//
// Two-phase protocol: a COUNT query mirroring the joins/filter, then a
// full fetch (no LIMIT/OFFSET), record conversion in descriptor field
// order, an in-memory natural sort, and the page slice. Natural ordering
// ("item2" before "item10") is the point of sorting here instead of in
// the database; do not push the sort down.

use crate::domain::entity::{Entity, EntityDescriptor};
use crate::domain::natural::natural_value_cmp;
use crate::domain::page::{Page, PageInfo, SortOrder};
use crate::domain::value::{Record, Value};
use crate::error::{RepoError, Result};
use crate::port::session::Session;
use crate::query::{JoinType, Predicate, SelectBuilder};
use crate::repository::ensure_session_open;
use std::marker::PhantomData;
use tracing::debug;

/// One page request. `Default` is page 1, size 10, inner joins, ascending.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub page: u64,
    pub size: u64,
    /// Relation names from the entity descriptor, joined uniformly.
    pub join_relations: Vec<String>,
    pub join_type: JoinType,
    /// Optional column subset; defaults to every descriptor field.
    pub select_fields: Option<Vec<String>>,
    pub predicate: Option<Predicate>,
    pub order_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: 10,
            join_relations: Vec::new(),
            join_type: JoinType::Inner,
            select_fields: None,
            predicate: None,
            order_by: None,
            sort_order: SortOrder::Asc,
        }
    }
}

impl PageQuery {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }
}

/// Pagination over one entity type. Pages carry `Record`s, not entities:
/// joined/subset rows do not always rebuild a full entity.
pub struct PageableOperations<E: Entity> {
    descriptor: &'static EntityDescriptor,
    _entity: PhantomData<E>,
}

impl<E: Entity> PageableOperations<E> {
    pub fn new() -> Result<Self> {
        let descriptor = E::descriptor();
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            _entity: PhantomData,
        })
    }

    /// Runs the count+fetch+sort+slice protocol for one page.
    pub async fn get_page(
        &self,
        session: &mut dyn Session,
        query: &PageQuery,
    ) -> Result<Page<Record>> {
        ensure_session_open(session)?;
        if query.page < 1 || query.size < 1 {
            return Err(RepoError::Validation(
                "Page and size must be greater than 0".into(),
            ));
        }
        if let Some(order_by) = &query.order_by {
            self.descriptor
                .field(order_by)
                .ok_or_else(|| {
                    RepoError::Validation(format!("Invalid order_by field: {order_by}"))
                })?;
        }

        let builder = self.builder_for(query)?;
        let (count_sql, count_params) = builder.build_count();
        let (fetch_sql, fetch_params) = builder.build();

        let count_result = session.execute(&count_sql, &count_params).await?;
        let total_items = count_result
            .into_rows()
            .first()
            .and_then(|row| row.first_value().and_then(Value::as_integer))
            .unwrap_or(0)
            .max(0) as u64;

        let rows = session.execute(&fetch_sql, &fetch_params).await?.into_rows();
        let mut items: Vec<Record> = rows
            .into_iter()
            .map(|row| self.order_by_descriptor(&row))
            .collect();

        if let Some(order_by) = &query.order_by {
            let descending = query.sort_order.is_descending();
            items.sort_by(|a, b| {
                let left = a.get(order_by).unwrap_or(&Value::Null);
                let right = b.get(order_by).unwrap_or(&Value::Null);
                let ord = natural_value_cmp(left, right);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        // slice after the sort, in memory
        let start = ((query.page - 1) * query.size) as usize;
        let end = start.saturating_add(query.size as usize);
        let data: Vec<Record> = if start >= items.len() {
            Vec::new()
        } else {
            items[start..end.min(items.len())].to_vec()
        };

        debug!(
            table = self.descriptor.table,
            page = query.page,
            total_items,
            "page assembled"
        );
        Ok(Page::new(
            data,
            PageInfo::new(query.page, query.size, total_items),
        ))
    }

    /// Search-and-paginate: OR-combined case-insensitive substring match
    /// over the given fields, skipping names that do not resolve.
    pub async fn find_page(
        &self,
        session: &mut dyn Session,
        search_term: &str,
        search_fields: &[&str],
        query: &PageQuery,
    ) -> Result<Page<Record>> {
        ensure_session_open(session)?;
        if search_term.trim().is_empty() || search_fields.is_empty() {
            return Err(RepoError::Validation(
                "Search term and search fields are required".into(),
            ));
        }
        let resolved: Vec<&str> = search_fields
            .iter()
            .copied()
            .filter(|field| self.descriptor.has_field(field))
            .collect();
        if resolved.is_empty() {
            return Err(RepoError::Validation("No valid search fields found".into()));
        }

        let mut search_query = query.clone();
        search_query.predicate = Some(Predicate::any_like(&resolved, search_term));
        self.get_page(session, &search_query).await
    }

    fn builder_for<'a>(&'a self, query: &'a PageQuery) -> Result<SelectBuilder<'a>> {
        let mut builder = SelectBuilder::new(self.descriptor);
        if let Some(fields) = &query.select_fields {
            builder = builder.columns(fields)?;
        }
        for relation in &query.join_relations {
            builder = builder.join(relation, query.join_type)?;
        }
        if let Some(predicate) = &query.predicate {
            builder = builder.filter(predicate)?;
        }
        Ok(builder)
    }

    /// Reorders a row's fields to descriptor order, dropping columns the
    /// descriptor does not know.
    fn order_by_descriptor(&self, row: &Record) -> Record {
        self.descriptor
            .field_names()
            .filter_map(|field| {
                row.get(field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSession, TestUser};

    fn pageable() -> PageableOperations<TestUser> {
        PageableOperations::new().unwrap()
    }

    fn item_row(id: i64, name: &str) -> Record {
        // deliberately scrambled field order; the engine restores it
        let mut record = Record::new();
        record.insert("name", Value::Text(name.into()));
        record.insert("id", Value::Integer(id));
        record
    }

    fn push_count_and_rows(session: &mut ScriptedSession, total: i64, rows: Vec<Record>) {
        session.push_scalar(Value::Integer(total));
        session.push_rows(rows);
    }

    #[tokio::test]
    async fn rejects_page_or_size_below_one() {
        let mut session = ScriptedSession::new();
        let err = pageable()
            .get_page(&mut session, &PageQuery::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let err = pageable()
            .get_page(&mut session, &PageQuery::new(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(session.calls.is_empty());
    }

    #[tokio::test]
    async fn count_then_fetch_two_round_trips() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 2, vec![item_row(1, "a"), item_row(2, "b")]);

        let page = pageable()
            .get_page(&mut session, &PageQuery::default())
            .await
            .unwrap();

        assert_eq!(session.count_calls("execute"), 2);
        assert!(session.calls[0].starts_with("execute:SELECT COUNT(*) FROM users"));
        assert!(session.calls[1].starts_with("execute:SELECT users.id"));
        // fetch is never LIMITed; slicing happens in memory
        assert!(!session.calls[1].contains("LIMIT"));
        assert_eq!(page.pagination.total_items, 2);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn natural_sort_orders_item2_before_item10() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(
            &mut session,
            3,
            vec![
                item_row(1, "item10"),
                item_row(2, "item2"),
                item_row(3, "item1"),
            ],
        );

        let mut query = PageQuery::default();
        query.order_by = Some("name".into());
        let page = pageable().get_page(&mut session, &query).await.unwrap();

        let names: Vec<&str> = page
            .data
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_text))
            .collect();
        assert_eq!(names, vec!["item1", "item2", "item10"]);
    }

    #[tokio::test]
    async fn descending_sort_and_slice_after_sort() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(
            &mut session,
            5,
            (1..=5).map(|i| item_row(i, &format!("item{i}"))).collect(),
        );

        let mut query = PageQuery::new(2, 2);
        query.order_by = Some("name".into());
        query.sort_order = SortOrder::Desc;
        let page = pageable().get_page(&mut session, &query).await.unwrap();

        // full order: item5 item4 item3 item2 item1; page 2 of size 2
        let names: Vec<&str> = page
            .data
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_text))
            .collect();
        assert_eq!(names, vec!["item3", "item2"]);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_with_metadata() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 2, vec![item_row(1, "a"), item_row(2, "b")]);

        let page = pageable()
            .get_page(&mut session, &PageQuery::new(9, 10))
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_items, 2);
        assert_eq!(page.pagination.current_page, 9);
    }

    #[tokio::test]
    async fn empty_result_reports_one_total_page() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 0, vec![]);

        let page = pageable()
            .get_page(&mut session, &PageQuery::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 0);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn joins_mirror_into_count_query() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 0, vec![]);

        let mut query = PageQuery::default();
        query.join_relations = vec!["team".into()];
        query.join_type = JoinType::Left;
        pageable().get_page(&mut session, &query).await.unwrap();

        let join_clause = "LEFT JOIN teams ON users.team_id = teams.id";
        assert!(session.calls[0].contains(join_clause));
        assert!(session.calls[1].contains(join_clause));
    }

    #[tokio::test]
    async fn records_come_back_in_descriptor_order() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 1, vec![item_row(1, "a")]);

        let page = pageable()
            .get_page(&mut session, &PageQuery::default())
            .await
            .unwrap();
        let fields: Vec<&str> = page.data[0].iter().map(|(name, _)| name).collect();
        assert_eq!(fields, vec!["id", "name"]);
    }

    #[tokio::test]
    async fn find_page_requires_term_and_resolvable_fields() {
        let mut session = ScriptedSession::new();
        let err = pageable()
            .find_page(&mut session, " ", &["name"], &PageQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let err = pageable()
            .find_page(&mut session, "john", &[], &PageQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let err = pageable()
            .find_page(&mut session, "john", &["ghost", "phantom"], &PageQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn find_page_skips_unresolvable_fields_and_searches_the_rest() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 0, vec![]);

        pageable()
            .find_page(
                &mut session,
                "john",
                &["ghost", "name"],
                &PageQuery::default(),
            )
            .await
            .unwrap();
        assert!(session.calls[0].contains("LOWER(users.name) LIKE LOWER(:p0)"));
        assert!(!session.calls[0].contains("ghost"));
    }

    #[tokio::test]
    async fn select_fields_restrict_the_row_shape() {
        let mut session = ScriptedSession::new();
        push_count_and_rows(&mut session, 0, vec![]);

        let mut query = PageQuery::default();
        query.select_fields = Some(vec!["id".into(), "name".into()]);
        pageable().get_page(&mut session, &query).await.unwrap();
        assert!(session.calls[1].starts_with("execute:SELECT users.id, users.name FROM users"));
    }
}
