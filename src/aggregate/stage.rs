use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::query::{
    Filter, MAX_SORT_FIELDS, SortSpec, as_f64, compare_bson, compare_docs, eval_filter, get_path, remove_path, set_path,
    values_equal,
};
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::expr::{Expr, int_result};

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    First(Expr),
    Last(Expr),
    Count,
}

impl Accumulator {
    fn expr(&self) -> Option<&Expr> {
        match self {
            Self::Sum(e) | Self::Avg(e) | Self::Min(e) | Self::Max(e) | Self::First(e) | Self::Last(e) => Some(e),
            Self::Count => None,
        }
    }

    fn start(&self) -> AccState {
        match self {
            Self::Sum(_) | Self::Count => AccState::Sum { int: Some(0), float: 0.0, any_float: false },
            Self::Avg(_) => AccState::Avg { total: 0.0, n: 0 },
            Self::Min(_) => AccState::Pick { best: None, want: Ordering::Less },
            Self::Max(_) => AccState::Pick { best: None, want: Ordering::Greater },
            Self::First(_) => AccState::First(None),
            Self::Last(_) => AccState::Last(Bson::Null),
        }
    }
}

#[derive(Debug, Clone)]
enum AccState {
    Sum { int: Option<i64>, float: f64, any_float: bool },
    Avg { total: f64, n: u64 },
    Pick { best: Option<Bson>, want: Ordering },
    First(Option<Bson>),
    Last(Bson),
}

impl AccState {
    #[allow(clippy::cast_precision_loss)]
    fn feed(&mut self, v: Bson) {
        match self {
            Self::Sum { int, float, any_float } => {
                // non-numeric values are skipped
                let Some(f) = as_f64(&v) else { return };
                *float += f;
                match v {
                    Bson::Int32(i) => *int = int.and_then(|acc| acc.checked_add(i64::from(i))),
                    Bson::Int64(i) => *int = int.and_then(|acc| acc.checked_add(i)),
                    _ => *any_float = true,
                }
            }
            Self::Avg { total, n } => {
                if let Some(f) = as_f64(&v) {
                    *total += f;
                    *n += 1;
                }
            }
            Self::Pick { best, want } => {
                if matches!(v, Bson::Null | Bson::Undefined) {
                    return;
                }
                let replace = best.as_ref().is_none_or(|b| compare_bson(&v, b) == *want);
                if replace {
                    *best = Some(v);
                }
            }
            Self::First(slot) => {
                if slot.is_none() {
                    *slot = Some(v);
                }
            }
            Self::Last(slot) => *slot = v,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { int, float, any_float } => match int {
                Some(i) if !any_float => int_result(i),
                _ => Bson::Double(float),
            },
            Self::Avg { total, n } => {
                if n == 0 { Bson::Null } else { Bson::Double(total / n as f64) }
            }
            Self::Pick { best, .. } => best.unwrap_or(Bson::Null),
            Self::First(v) => v.unwrap_or(Bson::Null),
            Self::Last(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group { id: Expr, fields: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
    Project(Vec<(String, ProjectField)>),
    /// Replaces the stream with one `{<name>: n}` document.
    Count(String),
}

impl Stage {
    /// # Errors
    /// Returns an error if an expression fails to evaluate.
    pub fn apply(&self, docs: Vec<BsonDocument>) -> Result<Vec<BsonDocument>, DbError> {
        match self {
            Self::Match(f) => Ok(docs.into_iter().filter(|d| eval_filter(d, f)).collect()),
            Self::Group { id, fields } => group(docs, id, fields),
            Self::Sort(spec) => {
                if spec.len() > MAX_SORT_FIELDS {
                    return Err(DbError::PipelineError(format!(
                        "sort has {} keys; at most {MAX_SORT_FIELDS} allowed",
                        spec.len()
                    )));
                }
                let mut docs = docs;
                docs.sort_by(|a, b| compare_docs(a, b, spec));
                Ok(docs)
            }
            Self::Skip(n) => Ok(docs.into_iter().skip(*n).collect()),
            Self::Limit(n) => Ok(docs.into_iter().take(*n).collect()),
            Self::Project(fields) => docs.iter().map(|d| project(d, fields)).collect(),
            Self::Count(name) => {
                let mut out = BsonDocument::new();
                out.insert(name.clone(), int_result(i64::try_from(docs.len()).unwrap_or(i64::MAX)));
                Ok(vec![out])
            }
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Group { .. } => "$group",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Project(_) => "$project",
            Self::Count(_) => "$count",
        }
    }
}

/// Ordered list of stages; each consumes the previous stage's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Runs every stage over an in-memory input stream.
    ///
    /// # Errors
    /// Returns the first stage error, tagged with the stage position.
    pub fn run(&self, input: Vec<BsonDocument>) -> Result<Vec<BsonDocument>, DbError> {
        run_stages(&self.stages, 0, input)
    }
}

/// `offset` is the position of `stages[0]` within the full pipeline, for error messages.
pub(crate) fn run_stages(
    stages: &[Stage],
    offset: usize,
    input: Vec<BsonDocument>,
) -> Result<Vec<BsonDocument>, DbError> {
    stages.iter().enumerate().try_fold(input, |docs, (i, stage)| {
        stage.apply(docs).map_err(|e| match e {
            DbError::PipelineError(msg) => {
                DbError::PipelineError(format!("stage {} ({}): {msg}", i + offset, stage.name()))
            }
            other => other,
        })
    })
}

/// Groups are emitted in order of first appearance of their key.
fn group(
    docs: Vec<BsonDocument>,
    id: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<BsonDocument>, DbError> {
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for d in &docs {
        let key = id.eval(d)?;
        let pos = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(p) => p,
            None => {
                groups.push((key, fields.iter().map(|(_, a)| a.start()).collect()));
                groups.len() - 1
            }
        };
        let states = &mut groups[pos].1;
        for ((_, acc), state) in fields.iter().zip(states.iter_mut()) {
            let v = match acc.expr() {
                Some(e) => e.eval(d)?,
                None => Bson::Int32(1),
            };
            state.feed(v);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert(ID_FIELD, key);
            for ((name, _), state) in fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

fn project(doc: &BsonDocument, fields: &[(String, ProjectField)]) -> Result<BsonDocument, DbError> {
    let inclusion = fields.iter().any(|(_, f)| !matches!(f, ProjectField::Exclude));
    if !inclusion {
        let mut out = doc.clone();
        for (k, _) in fields {
            remove_path(&mut out, k);
        }
        return Ok(out);
    }
    let mut out = BsonDocument::new();
    let id_excluded = fields.iter().any(|(k, f)| k == ID_FIELD && matches!(f, ProjectField::Exclude));
    if !id_excluded && let Some(v) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD, v.clone());
    }
    for (k, f) in fields {
        match f {
            ProjectField::Include => {
                if let Some(v) = get_path(doc, k) {
                    set_path(&mut out, k, v.clone());
                }
            }
            ProjectField::Computed(e) => set_path(&mut out, k, e.eval(doc)?),
            ProjectField::Exclude => {}
        }
    }
    Ok(out)
}
