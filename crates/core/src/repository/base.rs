// Composed repository
//
// Holds the three capability components and exposes their operations as
// one surface. Delegation only; each component stays independently usable.

use crate::domain::entity::Entity;
use crate::domain::page::{Page, SortOrder};
use crate::domain::value::{Record, Value};
use crate::error::Result;
use crate::port::session::Session;
use crate::repository::crud::CrudOperations;
use crate::repository::find::{DateArg, FindOperations, LookupKey};
use crate::repository::pageable::{PageQuery, PageableOperations};

/// Generic repository for one entity type. Stateless apart from the
/// entity descriptor, so a single instance is safe to share across tasks;
/// the session travels with every call.
pub struct Repository<E: Entity> {
    crud: CrudOperations<E>,
    find: FindOperations<E>,
    pageable: PageableOperations<E>,
}

impl<E: Entity> Repository<E> {
    /// Validates the descriptor once and builds all three components.
    pub fn new() -> Result<Self> {
        Ok(Self {
            crud: CrudOperations::new()?,
            find: FindOperations::new()?,
            pageable: PageableOperations::new()?,
        })
    }

    pub fn crud(&self) -> &CrudOperations<E> {
        &self.crud
    }

    pub fn finders(&self) -> &FindOperations<E> {
        &self.find
    }

    pub fn pages(&self) -> &PageableOperations<E> {
        &self.pageable
    }

    // -- CRUD ------------------------------------------------------------

    pub async fn save(&self, session: &mut dyn Session, entity: &mut E) -> Result<()> {
        self.crud.save(session, entity).await
    }

    pub async fn get_all(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
        order_by: Option<&str>,
        sort_order: SortOrder,
    ) -> Result<Vec<E>> {
        self.crud.get_all(session, filters, order_by, sort_order).await
    }

    /// Identity lookup that errors on a miss.
    pub async fn get_by_id(&self, session: &mut dyn Session, id: i64) -> Result<E> {
        self.crud.get_by_id(session, id).await
    }

    pub async fn update(&self, session: &mut dyn Session, id: i64, entity: &E) -> Result<E> {
        self.crud.update(session, id, entity).await
    }

    pub async fn delete(&self, session: &mut dyn Session, id: i64) -> Result<bool> {
        self.crud.delete(session, id).await
    }

    // -- Finders ---------------------------------------------------------

    /// Identity lookup that returns `None` on a miss.
    pub async fn find_by_id(&self, session: &mut dyn Session, id: i64) -> Result<Option<E>> {
        self.find.find_by_id(session, id).await
    }

    pub async fn find_all(&self, session: &mut dyn Session) -> Result<Vec<E>> {
        self.find.find_all(session).await
    }

    pub async fn find_all_by_id(&self, session: &mut dyn Session, ids: &[i64]) -> Result<Vec<E>> {
        self.find.find_all_by_id(session, ids).await
    }

    pub async fn exists_by(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
    ) -> Result<bool> {
        self.find.exists_by(session, filters).await
    }

    pub async fn find_by(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
    ) -> Result<Vec<E>> {
        self.find.find_by(session, filters).await
    }

    pub async fn find_one(
        &self,
        session: &mut dyn Session,
        key: impl Into<LookupKey>,
    ) -> Result<Option<E>> {
        self.find.find_one(session, key).await
    }

    pub async fn find_by_date_between(
        &self,
        session: &mut dyn Session,
        date_field: &str,
        start: impl Into<DateArg>,
        end: impl Into<DateArg>,
    ) -> Result<Vec<E>> {
        self.find
            .find_by_date_between(session, date_field, start, end)
            .await
    }

    pub async fn find_latest(
        &self,
        session: &mut dyn Session,
        order_by: Option<&str>,
    ) -> Result<Option<E>> {
        self.find.find_latest(session, order_by).await
    }

    pub async fn find_first(
        &self,
        session: &mut dyn Session,
        order_by: Option<&str>,
    ) -> Result<Option<E>> {
        self.find.find_first(session, order_by).await
    }

    pub async fn find_by_like(
        &self,
        session: &mut dyn Session,
        fields: &[&str],
        value: &str,
    ) -> Result<Vec<E>> {
        self.find.find_by_like(session, fields, value).await
    }

    pub async fn search(
        &self,
        session: &mut dyn Session,
        value: &str,
        fields: Option<&[&str]>,
    ) -> Result<Vec<E>> {
        self.find.search(session, value, fields).await
    }

    // -- Pagination ------------------------------------------------------

    pub async fn get_page(
        &self,
        session: &mut dyn Session,
        query: &PageQuery,
    ) -> Result<Page<Record>> {
        self.pageable.get_page(session, query).await
    }

    pub async fn find_page(
        &self,
        session: &mut dyn Session,
        search_term: &str,
        search_fields: &[&str],
        query: &PageQuery,
    ) -> Result<Page<Record>> {
        self.pageable
            .find_page(session, search_term, search_fields, query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{user_record, ScriptedSession, TestUser};

    #[tokio::test]
    async fn repository_delegates_across_components() {
        let repo: Repository<TestUser> = Repository::new().unwrap();
        let mut session = ScriptedSession::new();

        session.push_write(1, Some(1));
        let mut user = TestUser {
            name: Some("Ann".into()),
            ..TestUser::default()
        };
        repo.save(&mut session, &mut user).await.unwrap();
        assert_eq!(user.id, Some(1));

        session.push_rows(vec![user_record(1, "Ann", "a@x.com", "active", 30)]);
        assert!(repo.find_by_id(&mut session, 1).await.unwrap().is_some());

        session.push_scalar(Value::Integer(1));
        session.push_rows(vec![user_record(1, "Ann", "a@x.com", "active", 30)]);
        let page = repo
            .get_page(&mut session, &PageQuery::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 1);
    }
}
