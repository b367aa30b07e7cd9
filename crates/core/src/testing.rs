// Scripted Session double and fixture entity for component tests

use crate::domain::entity::{Entity, EntityDescriptor, FieldDef, FieldKind, RelationDef};
use crate::domain::value::{Params, Record, Value};
use crate::error::{DatabaseError, RepoError, Result};
use crate::port::session::{ExecuteResult, Session, TransactionMode};
use async_trait::async_trait;
use std::collections::VecDeque;

/// In-memory `Session` that replays queued responses and logs every call.
///
/// `execute` pops the front of `responses`; an empty queue yields an empty
/// non-row result. Transaction calls always succeed and are recorded.
pub struct ScriptedSession {
    pub open: bool,
    in_tx: bool,
    pub calls: Vec<String>,
    pub responses: VecDeque<Result<ExecuteResult>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            open: true,
            in_tx: false,
            calls: Vec::new(),
            responses: VecDeque::new(),
        }
    }

    pub fn closed() -> Self {
        let mut session = Self::new();
        session.open = false;
        session
    }

    pub fn push_rows(&mut self, rows: Vec<Record>) {
        self.responses.push_back(Ok(ExecuteResult {
            rows: Some(rows),
            rows_affected: 0,
            last_insert_id: None,
        }));
    }

    pub fn push_scalar(&mut self, value: Value) {
        let mut record = Record::new();
        record.insert("value", value);
        self.push_rows(vec![record]);
    }

    pub fn push_write(&mut self, rows_affected: u64, last_insert_id: Option<i64>) {
        self.responses.push_back(Ok(ExecuteResult {
            rows: None,
            rows_affected,
            last_insert_id,
        }));
    }

    pub fn push_transient(&mut self, message: &str) {
        self.responses
            .push_back(Err(RepoError::Database(DatabaseError::transient(message))));
    }

    pub fn push_permanent(&mut self, message: &str) {
        self.responses
            .push_back(Err(RepoError::Database(DatabaseError::permanent(message))));
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, sql: &str, _params: &Params) -> Result<ExecuteResult> {
        self.calls.push(format!("execute:{sql}"));
        match self.responses.pop_front() {
            Some(result) => result,
            None => Ok(ExecuteResult::default()),
        }
    }

    async fn begin(&mut self) -> Result<()> {
        self.calls.push("begin".into());
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.calls.push("commit".into());
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.calls.push("rollback".into());
        self.in_tx = false;
        Ok(())
    }

    async fn set_transaction_mode(&mut self, mode: TransactionMode) -> Result<()> {
        self.calls.push(format!("mode:{mode:?}"));
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

static USER_FIELDS: &[FieldDef] = &[
    FieldDef { name: "id", kind: FieldKind::Integer },
    FieldDef { name: "name", kind: FieldKind::Text },
    FieldDef { name: "email", kind: FieldKind::Text },
    FieldDef { name: "status", kind: FieldKind::Text },
    FieldDef { name: "age", kind: FieldKind::Integer },
    FieldDef { name: "team_id", kind: FieldKind::Integer },
];

static USER_RELATIONS: &[RelationDef] = &[RelationDef {
    name: "team",
    target_table: "teams",
    local_column: "team_id",
    foreign_column: "id",
}];

pub static USER_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    table: "users",
    primary_key: "id",
    fields: USER_FIELDS,
    relations: USER_RELATIONS,
};

/// Fixture entity: `None` fields are "not explicitly set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestUser {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
}

impl Entity for TestUser {
    fn descriptor() -> &'static EntityDescriptor {
        &USER_DESCRIPTOR
    }

    fn record(&self) -> Record {
        let mut record = Record::new();
        if let Some(id) = self.id {
            record.insert("id", Value::Integer(id));
        }
        if let Some(name) = &self.name {
            record.insert("name", Value::Text(name.clone()));
        }
        if let Some(email) = &self.email {
            record.insert("email", Value::Text(email.clone()));
        }
        if let Some(status) = &self.status {
            record.insert("status", Value::Text(status.clone()));
        }
        if let Some(age) = self.age {
            record.insert("age", Value::Integer(age));
        }
        if let Some(team_id) = self.team_id {
            record.insert("team_id", Value::Integer(team_id));
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get("id").and_then(Value::as_integer),
            name: record.get("name").and_then(|v| v.as_text().map(str::to_string)),
            email: record.get("email").and_then(|v| v.as_text().map(str::to_string)),
            status: record.get("status").and_then(|v| v.as_text().map(str::to_string)),
            age: record.get("age").and_then(Value::as_integer),
            team_id: record.get("team_id").and_then(Value::as_integer),
        })
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// Row helper for scripting result sets.
pub fn user_record(id: i64, name: &str, email: &str, status: &str, age: i64) -> Record {
    let mut record = Record::new();
    record.insert("id", Value::Integer(id));
    record.insert("name", Value::Text(name.into()));
    record.insert("email", Value::Text(email.into()));
    record.insert("status", Value::Text(status.into()));
    record.insert("age", Value::Integer(age));
    record.insert("team_id", Value::Null);
    record
}
