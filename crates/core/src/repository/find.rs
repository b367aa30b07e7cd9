// Finder operations

use crate::domain::entity::{Entity, EntityDescriptor, FieldKind};
use crate::domain::page::SortOrder;
use crate::domain::value::Value;
use crate::error::{RepoError, Result};
use crate::port::session::Session;
use crate::query::{Predicate, SelectBuilder};
use crate::repository::crud::fetch_by_id;
use crate::repository::ensure_session_open;
use chrono::NaiveDate;
use std::marker::PhantomData;

/// Date-range bound: a `YYYY-MM-DD` string or a native date.
#[derive(Debug, Clone)]
pub enum DateArg {
    Text(String),
    Date(NaiveDate),
}

impl DateArg {
    fn resolve(&self, position: &str) -> Result<NaiveDate> {
        match self {
            DateArg::Date(date) => Ok(*date),
            DateArg::Text(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
                RepoError::Validation(format!("{position} date must be in format yyyy-mm-dd"))
            }),
        }
    }
}

impl From<&str> for DateArg {
    fn from(s: &str) -> Self {
        DateArg::Text(s.to_string())
    }
}

impl From<NaiveDate> for DateArg {
    fn from(date: NaiveDate) -> Self {
        DateArg::Date(date)
    }
}

/// `find_one` argument: an identity or an equality-filter map.
#[derive(Debug, Clone)]
pub enum LookupKey {
    Id(i64),
    Filters(Vec<(String, Value)>),
}

impl From<i64> for LookupKey {
    fn from(id: i64) -> Self {
        LookupKey::Id(id)
    }
}

impl From<Vec<(String, Value)>> for LookupKey {
    fn from(filters: Vec<(String, Value)>) -> Self {
        LookupKey::Filters(filters)
    }
}

/// Read-only lookups for one entity type.
pub struct FindOperations<E: Entity> {
    descriptor: &'static EntityDescriptor,
    _entity: PhantomData<E>,
}

impl<E: Entity> FindOperations<E> {
    pub fn new() -> Result<Self> {
        let descriptor = E::descriptor();
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            _entity: PhantomData,
        })
    }

    /// Identity lookup. Returns `Ok(None)` on a miss; `get_by_id` is the
    /// erroring variant.
    pub async fn find_by_id(&self, session: &mut dyn Session, id: i64) -> Result<Option<E>> {
        ensure_session_open(session)?;
        match fetch_by_id(session, self.descriptor, id).await? {
            Some(record) => Ok(Some(E::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn find_all(&self, session: &mut dyn Session) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        let (sql, params) = SelectBuilder::new(self.descriptor).build();
        self.fetch_entities(session, &sql, &params).await
    }

    /// Batch identity lookup. An empty id collection is a caller bug.
    pub async fn find_all_by_id(&self, session: &mut dyn Session, ids: &[i64]) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        if ids.is_empty() {
            return Err(RepoError::Validation("IDs collection cannot be empty".into()));
        }
        let predicate = Predicate::InList {
            field: self.descriptor.primary_key.to_string(),
            values: ids.iter().map(|id| Value::Integer(*id)).collect(),
        };
        let (sql, params) = SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
        self.fetch_entities(session, &sql, &params).await
    }

    /// Equality-filter existence probe. At least one filter is required.
    pub async fn exists_by(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
    ) -> Result<bool> {
        ensure_session_open(session)?;
        if filters.is_empty() {
            return Err(RepoError::Validation(
                "At least one filter condition required".into(),
            ));
        }
        let predicate = Predicate::all_eq(filters);
        let (sql, params) = SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
        let result = session.execute(&sql, &params).await?;
        Ok(!result.into_rows().is_empty())
    }

    /// Equality-filter list query; an empty filter map returns everything.
    pub async fn find_by(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
    ) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        let predicate = Predicate::all_eq(filters);
        let (sql, params) = SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
        self.fetch_entities(session, &sql, &params).await
    }

    /// Single lookup by identity or by filters (first match wins).
    pub async fn find_one(
        &self,
        session: &mut dyn Session,
        key: impl Into<LookupKey>,
    ) -> Result<Option<E>> {
        ensure_session_open(session)?;
        match key.into() {
            LookupKey::Id(id) => self.find_by_id(session, id).await,
            LookupKey::Filters(filters) => {
                let borrowed: Vec<(&str, Value)> = filters
                    .iter()
                    .map(|(field, value)| (field.as_str(), value.clone()))
                    .collect();
                let predicate = Predicate::all_eq(&borrowed);
                let (sql, params) =
                    SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
                let result = session.execute(&sql, &params).await?;
                match result.into_rows().first() {
                    Some(record) => Ok(Some(E::from_record(record)?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Inclusive range filter on a date/time field.
    pub async fn find_by_date_between(
        &self,
        session: &mut dyn Session,
        date_field: &str,
        start: impl Into<DateArg>,
        end: impl Into<DateArg>,
    ) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        let field = self
            .descriptor
            .field(date_field)
            .ok_or_else(|| RepoError::Validation(format!("Invalid date field: {date_field}")))?;
        if !matches!(field.kind, FieldKind::Date | FieldKind::DateTime) {
            return Err(RepoError::Validation(format!(
                "Invalid date field: {date_field}"
            )));
        }
        let start = start.into().resolve("Start")?;
        let end = end.into().resolve("End")?;
        if start > end {
            return Err(RepoError::Validation(
                "Start date must be before or equal to end date".into(),
            ));
        }

        // whole-day bounds so DateTime columns match every moment of `end`
        let end_of_day = chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(chrono::NaiveTime::MIN);
        let predicate = Predicate::Between {
            field: date_field.to_string(),
            low: Value::DateTime(start.and_time(chrono::NaiveTime::MIN)),
            high: Value::DateTime(end.and_time(end_of_day)),
        };
        let (sql, params) = SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
        self.fetch_entities(session, &sql, &params).await
    }

    /// Newest row by `order_by` (default `created_at`).
    pub async fn find_latest(
        &self,
        session: &mut dyn Session,
        order_by: Option<&str>,
    ) -> Result<Option<E>> {
        self.find_edge(session, order_by.unwrap_or("created_at"), SortOrder::Desc)
            .await
    }

    /// Oldest row by `order_by` (default: the primary key).
    pub async fn find_first(
        &self,
        session: &mut dyn Session,
        order_by: Option<&str>,
    ) -> Result<Option<E>> {
        self.find_edge(
            session,
            order_by.unwrap_or(self.descriptor.primary_key),
            SortOrder::Asc,
        )
        .await
    }

    /// Case-insensitive substring match across one or more text fields,
    /// OR-combined.
    pub async fn find_by_like(
        &self,
        session: &mut dyn Session,
        fields: &[&str],
        value: &str,
    ) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        if value.trim().is_empty() {
            return Err(RepoError::Validation("Valid search value required".into()));
        }
        if fields.is_empty() {
            return Err(RepoError::Validation(
                "At least one search field required".into(),
            ));
        }
        for field in fields {
            self.descriptor.require_field(field)?;
        }
        let predicate = Predicate::any_like(fields, value);
        let (sql, params) = SelectBuilder::new(self.descriptor).filter(&predicate)?.build();
        self.fetch_entities(session, &sql, &params).await
    }

    /// `find_by_like` defaulting to every text field of the descriptor.
    pub async fn search(
        &self,
        session: &mut dyn Session,
        value: &str,
        fields: Option<&[&str]>,
    ) -> Result<Vec<E>> {
        match fields {
            Some(fields) => self.find_by_like(session, fields, value).await,
            None => {
                let text_fields = self.descriptor.text_fields();
                self.find_by_like(session, &text_fields, value).await
            }
        }
    }

    async fn find_edge(
        &self,
        session: &mut dyn Session,
        order_by: &str,
        sort_order: SortOrder,
    ) -> Result<Option<E>> {
        ensure_session_open(session)?;
        let (sql, params) = SelectBuilder::new(self.descriptor)
            .order_by(order_by, sort_order)?
            .build();
        let result = session.execute(&sql, &params).await?;
        match result.into_rows().first() {
            Some(record) => Ok(Some(E::from_record(record)?)),
            None => Ok(None),
        }
    }

    async fn fetch_entities(
        &self,
        session: &mut dyn Session,
        sql: &str,
        params: &crate::domain::value::Params,
    ) -> Result<Vec<E>> {
        let result = session.execute(sql, params).await?;
        result.into_rows().iter().map(E::from_record).collect()
    }
}
