// Shared fixtures for the end-to-end test suite: entity types, schema
// setup, and session helpers against SQLite.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use strata_core::domain::{
    Entity, EntityDescriptor, FieldDef, FieldKind, Params, Record, RelationDef, Value,
};
use strata_core::error::Result;
use strata_core::port::Session;
use strata_infra_sqlite::{create_pool, SqliteSession};

/// Installs a test log subscriber once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

// ---------------------------------------------------------------------------
// User fixture

static USER_FIELDS: &[FieldDef] = &[
    FieldDef { name: "id", kind: FieldKind::Integer },
    FieldDef { name: "name", kind: FieldKind::Text },
    FieldDef { name: "email", kind: FieldKind::Text },
    FieldDef { name: "status", kind: FieldKind::Text },
    FieldDef { name: "age", kind: FieldKind::Integer },
    FieldDef { name: "created_at", kind: FieldKind::DateTime },
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

/// `None` means "not explicitly set" and powers partial updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub age: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub team_id: Option<i64>,
}

impl User {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

impl Entity for User {
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
        if let Some(created_at) = self.created_at {
            record.insert("created_at", Value::DateTime(created_at));
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
            created_at: record.get("created_at").and_then(Value::as_datetime),
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

// ---------------------------------------------------------------------------
// Account fixture (conservation tests)

static ACCOUNT_FIELDS: &[FieldDef] = &[
    FieldDef { name: "id", kind: FieldKind::Integer },
    FieldDef { name: "owner", kind: FieldKind::Text },
    FieldDef { name: "balance", kind: FieldKind::Integer },
];

pub static ACCOUNT_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    table: "accounts",
    primary_key: "id",
    fields: ACCOUNT_FIELDS,
    relations: &[],
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: Option<i64>,
    pub owner: Option<String>,
    pub balance: Option<i64>,
}

impl Entity for Account {
    fn descriptor() -> &'static EntityDescriptor {
        &ACCOUNT_DESCRIPTOR
    }

    fn record(&self) -> Record {
        let mut record = Record::new();
        if let Some(id) = self.id {
            record.insert("id", Value::Integer(id));
        }
        if let Some(owner) = &self.owner {
            record.insert("owner", Value::Text(owner.clone()));
        }
        if let Some(balance) = self.balance {
            record.insert("balance", Value::Integer(balance));
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get("id").and_then(Value::as_integer),
            owner: record.get("owner").and_then(|v| v.as_text().map(str::to_string)),
            balance: record.get("balance").and_then(Value::as_integer),
        })
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

// ---------------------------------------------------------------------------
// Schema + session helpers

pub const USERS_DDL: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    email TEXT,
    status TEXT,
    age INTEGER,
    created_at TEXT,
    team_id INTEGER
)";

pub const TEAMS_DDL: &str = "CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT
)";

pub const ACCOUNTS_DDL: &str = "CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT,
    balance INTEGER
)";

pub async fn memory_pool() -> SqlitePool {
    create_pool("sqlite::memory:").await.unwrap()
}

/// One session with the full test schema installed.
pub async fn session_with_schema(pool: &SqlitePool) -> SqliteSession {
    let mut session = SqliteSession::connect(pool).await.unwrap();
    for ddl in [USERS_DDL, TEAMS_DDL, ACCOUNTS_DDL] {
        session.execute(ddl, &Params::new()).await.unwrap();
    }
    session
}

/// Schema installation through a short-lived session, for tests that open
/// several sessions against one shared database file.
pub async fn install_schema(pool: &SqlitePool) {
    let mut session = SqliteSession::connect(pool).await.unwrap();
    for ddl in [USERS_DDL, TEAMS_DDL, ACCOUNTS_DDL] {
        session.execute(ddl, &Params::new()).await.unwrap();
    }
}
