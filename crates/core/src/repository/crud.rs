// Basic CRUD operations

use crate::domain::entity::{Entity, EntityDescriptor};
use crate::domain::page::SortOrder;
use crate::domain::value::{Params, Record, Value};
use crate::error::{RepoError, Result};
use crate::port::session::Session;
use crate::query::{Predicate, SelectBuilder};
use crate::repository::ensure_session_open;
use std::marker::PhantomData;
use tracing::debug;

/// Create/read/update/delete operations for one entity type.
///
/// Writes are flushed, never committed: identity is assigned from the
/// statement result and the surrounding transaction decides the fate of
/// the change.
pub struct CrudOperations<E: Entity> {
    descriptor: &'static EntityDescriptor,
    _entity: PhantomData<E>,
}

impl<E: Entity> CrudOperations<E> {
    /// Validates the entity descriptor once, up front.
    pub fn new() -> Result<Self> {
        let descriptor = E::descriptor();
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            _entity: PhantomData,
        })
    }

    /// Inserts the entity's set fields and assigns the generated identity.
    pub async fn save(&self, session: &mut dyn Session, entity: &mut E) -> Result<()> {
        ensure_session_open(session)?;
        let record = entity.record();
        for (field, _) in record.iter() {
            self.descriptor.require_field(field)?;
        }

        let (sql, params) = build_insert(self.descriptor, &record);
        let result = session.execute(&sql, &params).await?;
        if entity.id().is_none() {
            if let Some(id) = result.last_insert_id {
                entity.set_id(id);
            }
        }
        debug!(table = self.descriptor.table, "entity saved");
        Ok(())
    }

    /// All entities matching an equality-filter map, optionally ordered by
    /// a single column.
    pub async fn get_all(
        &self,
        session: &mut dyn Session,
        filters: &[(&str, Value)],
        order_by: Option<&str>,
        sort_order: SortOrder,
    ) -> Result<Vec<E>> {
        ensure_session_open(session)?;
        let predicate = Predicate::all_eq(filters);
        let mut builder = SelectBuilder::new(self.descriptor).filter(&predicate)?;
        if let Some(field) = order_by {
            builder = builder.order_by(field, sort_order)?;
        }
        let (sql, params) = builder.build();
        let result = session.execute(&sql, &params).await?;
        result
            .into_rows()
            .iter()
            .map(E::from_record)
            .collect()
    }

    /// Identity lookup; a miss is an error.
    pub async fn get_by_id(&self, session: &mut dyn Session, id: i64) -> Result<E> {
        ensure_session_open(session)?;
        match fetch_by_id(session, self.descriptor, id).await? {
            Some(record) => E::from_record(&record),
            None => Err(RepoError::NotFound(format!(
                "Entity not found with ID: {id}"
            ))),
        }
    }

    /// Copies every explicitly-set field of `entity` onto the stored row.
    /// Fields not set on the input are left untouched.
    pub async fn update(&self, session: &mut dyn Session, id: i64, entity: &E) -> Result<E> {
        ensure_session_open(session)?;
        let mut current = fetch_by_id(session, self.descriptor, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Entity not found with ID: {id}")))?;

        let changes = entity.record();
        let mut assignments: Vec<(&str, Value)> = Vec::new();
        for (field, value) in changes.iter() {
            self.descriptor.require_field(field)?;
            if field == self.descriptor.primary_key {
                continue;
            }
            assignments.push((field, value.clone()));
        }

        if !assignments.is_empty() {
            let (sql, params) = build_update(self.descriptor, id, &assignments);
            session.execute(&sql, &params).await?;
            for (field, value) in assignments {
                current.insert(field, value);
            }
        }
        debug!(table = self.descriptor.table, id, "entity updated");
        E::from_record(&current)
    }

    /// Removes the row; a miss is an error.
    pub async fn delete(&self, session: &mut dyn Session, id: i64) -> Result<bool> {
        ensure_session_open(session)?;
        fetch_by_id(session, self.descriptor, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Entity not found with ID: {id}")))?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = :p0",
            self.descriptor.table, self.descriptor.primary_key
        );
        let params: Params = vec![("p0".to_string(), Value::Integer(id))];
        let result = session.execute(&sql, &params).await?;
        debug!(table = self.descriptor.table, id, "entity deleted");
        Ok(result.rows_affected > 0)
    }
}

/// Single-row identity fetch shared by CRUD and finder paths.
pub(crate) async fn fetch_by_id(
    session: &mut dyn Session,
    descriptor: &EntityDescriptor,
    id: i64,
) -> Result<Option<Record>> {
    let predicate = Predicate::Eq(descriptor.primary_key.to_string(), Value::Integer(id));
    let (sql, params) = SelectBuilder::new(descriptor).filter(&predicate)?.build();
    let result = session.execute(&sql, &params).await?;
    Ok(result.into_rows().into_iter().next())
}

fn build_insert(descriptor: &EntityDescriptor, record: &Record) -> (String, Params) {
    if record.is_empty() {
        return (
            format!("INSERT INTO {} DEFAULT VALUES", descriptor.table),
            Params::new(),
        );
    }
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Params::with_capacity(record.len());
    for (i, (field, value)) in record.iter().enumerate() {
        let name = format!("p{i}");
        columns.push(field.to_string());
        placeholders.push(format!(":{name}"));
        params.push((name, value.clone()));
    }
    (
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            descriptor.table,
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    )
}

fn build_update(
    descriptor: &EntityDescriptor,
    id: i64,
    assignments: &[(&str, Value)],
) -> (String, Params) {
    let mut sets = Vec::with_capacity(assignments.len());
    let mut params = Params::with_capacity(assignments.len() + 1);
    for (i, (field, value)) in assignments.iter().enumerate() {
        let name = format!("p{i}");
        sets.push(format!("{field} = :{name}"));
        params.push((name, value.clone()));
    }
    let id_name = format!("p{}", assignments.len());
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = :{id_name}",
        descriptor.table,
        sets.join(", "),
        descriptor.primary_key
    );
    params.push((id_name, Value::Integer(id)));
    (sql, params)
}
