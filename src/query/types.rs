use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Desc }
    }
}

/// Result shaping. `_id` is kept by an inclusion projection unless `include_id` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Include { fields: Vec<String>, include_id: bool },
    Exclude { fields: Vec<String> },
}

impl Projection {
    #[must_use]
    pub fn include(fields: &[&str]) -> Self {
        Self::Include { fields: fields.iter().map(|f| (*f).to_string()).collect(), include_id: true }
    }

    #[must_use]
    pub fn without_id(self) -> Self {
        match self {
            Self::Include { fields, .. } => Self::Include { fields, include_id: false },
            Self::Exclude { mut fields } => {
                if !fields.iter().any(|f| f == crate::document::ID_FIELD) {
                    fields.push(crate::document::ID_FIELD.to_string());
                }
                Self::Exclude { fields }
            }
        }
    }

    #[must_use]
    pub fn exclude(fields: &[&str]) -> Self {
        Self::Exclude { fields: fields.iter().map(|f| (*f).to_string()).collect() }
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Name of an index the planner must use.
    #[serde(default)]
    pub hint: Option<String>,
}

impl FindOptions {
    #[must_use]
    pub fn sorted(sort: Vec<SortSpec>) -> Self {
        Self { sort: Some(sort), ..Self::default() }
    }

    #[must_use]
    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn hint(mut self, index_name: &str) -> Self {
        self.hint = Some(index_name.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    fn cmp(path: &str, op: CmpOp, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.to_string(), op, value: value.into() }
    }

    pub fn eq(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Eq, value)
    }

    pub fn ne(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Ne, value)
    }

    pub fn gt(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Gt, value)
    }

    pub fn gte(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Gte, value)
    }

    pub fn lt(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Lt, value)
    }

    pub fn lte(path: &str, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Lte, value)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, f64)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    #[must_use]
    pub fn set(field: &str, value: impl Into<Bson>) -> Self {
        Self { set: vec![(field.to_string(), value.into())], ..Self::default() }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanKind {
    Collscan,
    Ixscan,
}

/// Execution statistics in the shape of an `executionStats` explain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainReport {
    pub collection: String,
    pub plan: PlanKind,
    pub index_name: Option<String>,
    pub keys_examined: u64,
    pub docs_examined: u64,
    pub n_returned: u64,
    pub execution_time_ms: u64,
}
