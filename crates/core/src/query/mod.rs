// Structured query builder
//
// Predicates validate against the entity descriptor before any SQL is
// rendered; placeholders are generated (`:p0`, `:p1`, ...) so the same
// field can appear more than once in a condition tree.

use crate::domain::entity::EntityDescriptor;
use crate::domain::page::SortOrder;
use crate::domain::value::{Params, Value};
use crate::error::{RepoError, Result};

/// Filter condition tree.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `field = value`
    Eq(String, Value),
    /// `field LIKE pattern`, optionally case-folded on both sides.
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// `field BETWEEN low AND high` (inclusive).
    Between {
        field: String,
        low: Value,
        high: Value,
    },
    /// `field IN (values...)`
    InList { field: String, values: Vec<Value> },
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    /// Equality conjunction from a field/value mapping.
    pub fn all_eq(filters: &[(&str, Value)]) -> Predicate {
        Predicate::And(
            filters
                .iter()
                .map(|(field, value)| Predicate::Eq((*field).to_string(), value.clone()))
                .collect(),
        )
    }

    /// Case-insensitive `%term%` match across several fields, OR-combined.
    pub fn any_like(fields: &[&str], term: &str) -> Predicate {
        Predicate::Or(
            fields
                .iter()
                .map(|field| Predicate::Like {
                    field: (*field).to_string(),
                    pattern: format!("%{term}%"),
                    case_insensitive: true,
                })
                .collect(),
        )
    }

    /// Checks every referenced field against the descriptor.
    pub fn validate(&self, descriptor: &EntityDescriptor) -> Result<()> {
        match self {
            Predicate::Eq(field, _) => descriptor.require_field(field).map(|_| ()),
            Predicate::Like { field, .. } => descriptor.require_field(field).map(|_| ()),
            Predicate::Between { field, .. } => descriptor.require_field(field).map(|_| ()),
            Predicate::InList { field, .. } => descriptor.require_field(field).map(|_| ()),
            Predicate::Or(children) | Predicate::And(children) => {
                children.iter().try_for_each(|child| child.validate(descriptor))
            }
        }
    }

    fn render(&self, table: &str, sql: &mut String, params: &mut Params, counter: &mut usize) {
        match self {
            Predicate::Eq(field, value) => {
                let name = next_param(counter);
                sql.push_str(&format!("{table}.{field} = :{name}"));
                params.push((name, value.clone()));
            }
            Predicate::Like {
                field,
                pattern,
                case_insensitive,
            } => {
                let name = next_param(counter);
                if *case_insensitive {
                    sql.push_str(&format!("LOWER({table}.{field}) LIKE LOWER(:{name})"));
                } else {
                    sql.push_str(&format!("{table}.{field} LIKE :{name}"));
                }
                params.push((name, Value::Text(pattern.clone())));
            }
            Predicate::Between { field, low, high } => {
                let low_name = next_param(counter);
                let high_name = next_param(counter);
                sql.push_str(&format!(
                    "{table}.{field} BETWEEN :{low_name} AND :{high_name}"
                ));
                params.push((low_name, low.clone()));
                params.push((high_name, high.clone()));
            }
            Predicate::InList { field, values } => {
                let mut names = Vec::with_capacity(values.len());
                for value in values {
                    let name = next_param(counter);
                    names.push(format!(":{name}"));
                    params.push((name, value.clone()));
                }
                sql.push_str(&format!("{table}.{field} IN ({})", names.join(", ")));
            }
            Predicate::Or(children) => render_group(children, " OR ", table, sql, params, counter),
            Predicate::And(children) => {
                render_group(children, " AND ", table, sql, params, counter)
            }
        }
    }

    fn is_vacuous(&self) -> bool {
        match self {
            Predicate::Or(children) | Predicate::And(children) => {
                children.iter().all(Predicate::is_vacuous)
            }
            _ => false,
        }
    }
}

fn render_group(
    children: &[Predicate],
    joiner: &str,
    table: &str,
    sql: &mut String,
    params: &mut Params,
    counter: &mut usize,
) {
    let live: Vec<&Predicate> = children.iter().filter(|c| !c.is_vacuous()).collect();
    // parenthesize only real groups; a single condition stands alone
    if live.len() == 1 {
        live[0].render(table, sql, params, counter);
        return;
    }
    sql.push('(');
    for (i, child) in live.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        child.render(table, sql, params, counter);
    }
    sql.push(')');
}

fn next_param(counter: &mut usize) -> String {
    let name = format!("p{counter}");
    *counter += 1;
    name
}

/// Join flavor, applied uniformly to every relation of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

impl JoinType {
    fn sql_keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// Assembles SELECT / COUNT statements for one entity table.
pub struct SelectBuilder<'a> {
    descriptor: &'a EntityDescriptor,
    columns: Option<Vec<String>>,
    joins: Vec<(JoinType, &'a crate::domain::entity::RelationDef)>,
    predicate: Option<&'a Predicate>,
    order: Option<(String, SortOrder)>,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(descriptor: &'a EntityDescriptor) -> Self {
        Self {
            descriptor,
            columns: None,
            joins: Vec::new(),
            predicate: None,
            order: None,
        }
    }

    /// Restricts the select list; every name is validated.
    pub fn columns(mut self, fields: &[String]) -> Result<Self> {
        for field in fields {
            self.descriptor.require_field(field)?;
        }
        self.columns = Some(fields.to_vec());
        Ok(self)
    }

    /// Adds a named relation join; unknown names fail validation.
    pub fn join(mut self, relation_name: &str, join_type: JoinType) -> Result<Self> {
        let relation = self.descriptor.relation(relation_name).ok_or_else(|| {
            RepoError::Validation(format!("Invalid relation name: {relation_name}"))
        })?;
        self.joins.push((join_type, relation));
        Ok(self)
    }

    pub fn filter(mut self, predicate: &'a Predicate) -> Result<Self> {
        predicate.validate(self.descriptor)?;
        self.predicate = Some(predicate);
        Ok(self)
    }

    pub fn order_by(mut self, field: &str, sort_order: SortOrder) -> Result<Self> {
        self.descriptor
            .field(field)
            .ok_or_else(|| RepoError::Validation(format!("Invalid order_by field: {field}")))?;
        self.order = Some((field.to_string(), sort_order));
        Ok(self)
    }

    /// Renders `SELECT cols FROM ... [joins] [where] [order]`.
    pub fn build(&self) -> (String, Params) {
        let table = self.descriptor.table;
        let select_list = match &self.columns {
            Some(cols) => cols
                .iter()
                .map(|c| format!("{table}.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
            None => self
                .descriptor
                .field_names()
                .map(|f| format!("{table}.{f}"))
                .collect::<Vec<_>>()
                .join(", "),
        };
        let mut sql = format!("SELECT {select_list} FROM {table}");
        let params = self.push_tail(&mut sql);
        if let Some((field, order)) = &self.order {
            sql.push_str(&format!(
                " ORDER BY {table}.{field} {}",
                order.sql_keyword()
            ));
        }
        (sql, params)
    }

    /// Renders the mirrored `SELECT COUNT(*)` with the same joins/filter.
    pub fn build_count(&self) -> (String, Params) {
        let table = self.descriptor.table;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let params = self.push_tail(&mut sql);
        (sql, params)
    }

    fn push_tail(&self, sql: &mut String) -> Params {
        let table = self.descriptor.table;
        for (join_type, relation) in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {table}.{} = {}.{}",
                join_type.sql_keyword(),
                relation.target_table,
                relation.local_column,
                relation.target_table,
                relation.foreign_column,
            ));
        }
        let mut params = Params::new();
        let mut counter = 0usize;
        if let Some(predicate) = self.predicate {
            if !predicate.is_vacuous() {
                let mut clause = String::new();
                predicate.render(table, &mut clause, &mut params, &mut counter);
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{FieldDef, FieldKind, RelationDef};

    static FIELDS: &[FieldDef] = &[
        FieldDef { name: "id", kind: FieldKind::Integer },
        FieldDef { name: "name", kind: FieldKind::Text },
        FieldDef { name: "status", kind: FieldKind::Text },
        FieldDef { name: "team_id", kind: FieldKind::Integer },
    ];
    static RELATIONS: &[RelationDef] = &[RelationDef {
        name: "team",
        target_table: "teams",
        local_column: "team_id",
        foreign_column: "id",
    }];
    static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
        table: "users",
        primary_key: "id",
        fields: FIELDS,
        relations: RELATIONS,
    };

    #[test]
    fn renders_full_select() {
        let predicate = Predicate::Eq("status".into(), Value::from("active"));
        let (sql, params) = SelectBuilder::new(&DESCRIPTOR)
            .filter(&predicate)
            .unwrap()
            .order_by("name", SortOrder::Desc)
            .unwrap()
            .build();
        assert_eq!(
            sql,
            "SELECT users.id, users.name, users.status, users.team_id FROM users \
             WHERE users.status = :p0 ORDER BY users.name DESC"
        );
        assert_eq!(params, vec![("p0".to_string(), Value::from("active"))]);
    }

    #[test]
    fn count_mirrors_joins_and_filter() {
        let predicate = Predicate::Eq("status".into(), Value::from("active"));
        let (sql, params) = SelectBuilder::new(&DESCRIPTOR)
            .join("team", JoinType::Left)
            .unwrap()
            .filter(&predicate)
            .unwrap()
            .build_count();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM users LEFT JOIN teams ON users.team_id = teams.id \
             WHERE users.status = :p0"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn or_like_predicate_generates_unique_params() {
        let predicate = Predicate::any_like(&["name", "status"], "john");
        let mut sql = String::new();
        let mut params = Params::new();
        let mut counter = 0;
        predicate.render("users", &mut sql, &mut params, &mut counter);
        assert_eq!(
            sql,
            "(LOWER(users.name) LIKE LOWER(:p0) OR LOWER(users.status) LIKE LOWER(:p1))"
        );
        assert_eq!(params[0].1, Value::Text("%john%".into()));
        assert_eq!(params[1].1, Value::Text("%john%".into()));
    }

    #[test]
    fn between_uses_two_placeholders() {
        let predicate = Predicate::Between {
            field: "id".into(),
            low: Value::from(1),
            high: Value::from(9),
        };
        let (sql, params) = SelectBuilder::new(&DESCRIPTOR)
            .filter(&predicate)
            .unwrap()
            .build();
        assert!(sql.ends_with("WHERE users.id BETWEEN :p0 AND :p1"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn unknown_field_or_relation_rejected() {
        let predicate = Predicate::Eq("nope".into(), Value::Null);
        assert!(SelectBuilder::new(&DESCRIPTOR).filter(&predicate).is_err());
        assert!(SelectBuilder::new(&DESCRIPTOR)
            .join("nope", JoinType::Inner)
            .is_err());
        assert!(SelectBuilder::new(&DESCRIPTOR)
            .order_by("nope", SortOrder::Asc)
            .is_err());
    }

    #[test]
    fn empty_conjunction_renders_no_where() {
        let predicate = Predicate::all_eq(&[]);
        let (sql, params) = SelectBuilder::new(&DESCRIPTOR)
            .filter(&predicate)
            .unwrap()
            .build();
        assert_eq!(
            sql,
            "SELECT users.id, users.name, users.status, users.team_id FROM users"
        );
        assert!(params.is_empty());
    }
}
