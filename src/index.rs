use crate::errors::DbError;
use crate::query::{CmpOp, Filter, Order, as_f64, get_path};
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

pub(crate) const MAX_INDEX_KEYS: usize = 8;

/// Ordered list of `(field, direction)` pairs an index is declared over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, Order)>,
}

impl IndexSpec {
    #[must_use]
    pub fn single(field: &str) -> Self {
        Self { keys: vec![(field.to_string(), Order::Asc)] }
    }

    #[must_use]
    pub fn compound(fields: &[&str]) -> Self {
        Self { keys: fields.iter().map(|f| ((*f).to_string(), Order::Asc)).collect() }
    }

    /// Mongo-style name: `author_1_published_year_1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(f, o)| match o {
                Order::Asc => format!("{f}_1"),
                Order::Desc => format!("{f}_-1"),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|(f, _)| f.as_str())
    }

    pub(crate) fn validate(&self) -> Result<(), DbError> {
        if self.keys.is_empty() {
            return Err(DbError::IndexError("index needs at least one key".into()));
        }
        if self.keys.len() > MAX_INDEX_KEYS {
            return Err(DbError::IndexError(format!(
                "index has {} keys; at most {MAX_INDEX_KEYS} allowed",
                self.keys.len()
            )));
        }
        for (i, (f, _)) in self.keys.iter().enumerate() {
            if f.is_empty() {
                return Err(DbError::IndexError("empty index field".into()));
            }
            if self.keys[..i].iter().any(|(g, _)| g == f) {
                return Err(DbError::IndexError(format!("duplicate index field: {f}")));
            }
        }
        Ok(())
    }
}

/// Key component. Variant order follows the cross-type rank used by query comparison,
/// and payloads order the way `compare_bson` orders them, so an index scan over a range
/// never misses a document a collection scan would match. Types compared by rank alone
/// share one payload-free key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    MinKey,
    Null,
    Num(OrderedFloat<f64>),
    Decimal,
    Str(String),
    Document,
    Array,
    Binary,
    ObjectId,
    Bool(bool),
    DateTime(i64),
    Timestamp,
    Regex,
    Code,
    MaxKey,
}

/// A missing field indexes as `Null`.
#[must_use]
pub fn key_from_bson(v: Option<&Bson>) -> IndexKey {
    let Some(v) = v else { return IndexKey::Null };
    if let Some(n) = as_f64(v) {
        return IndexKey::Num(OrderedFloat(n));
    }
    match v {
        Bson::MinKey => IndexKey::MinKey,
        Bson::Decimal128(_) => IndexKey::Decimal,
        Bson::String(s) | Bson::Symbol(s) => IndexKey::Str(s.clone()),
        Bson::Document(_) => IndexKey::Document,
        Bson::Array(_) => IndexKey::Array,
        Bson::Binary(_) => IndexKey::Binary,
        Bson::ObjectId(_) => IndexKey::ObjectId,
        Bson::Boolean(b) => IndexKey::Bool(*b),
        Bson::DateTime(d) => IndexKey::DateTime(d.timestamp_millis()),
        Bson::Timestamp(_) => IndexKey::Timestamp,
        Bson::RegularExpression(_) => IndexKey::Regex,
        Bson::DbPointer(_) | Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => IndexKey::Code,
        Bson::MaxKey => IndexKey::MaxKey,
        _ => IndexKey::Null,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub scans: u64,
    pub build_time_ms: u128,
}

/// Bounds on the leading key component of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub lower: Bound<IndexKey>,
    pub upper: Bound<IndexKey>,
}

impl KeyRange {
    #[must_use]
    pub const fn full() -> Self {
        Self { lower: Bound::Unbounded, upper: Bound::Unbounded }
    }

    fn below_upper(&self, k: &IndexKey) -> bool {
        match &self.upper {
            Bound::Included(u) => k <= u,
            Bound::Excluded(u) => k < u,
            Bound::Unbounded => true,
        }
    }

    fn excluded_lower(&self, k: &IndexKey) -> bool {
        matches!(&self.lower, Bound::Excluded(l) if k == l)
    }
}

#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub name: String,
    pub spec: IndexSpec,
    pub map: BTreeMap<Vec<IndexKey>, BTreeSet<DocumentId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { name: spec.name(), spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    fn key_for(&self, doc: &BsonDocument) -> Vec<IndexKey> {
        self.spec.keys.iter().map(|(f, _)| key_from_bson(get_path(doc, f))).collect()
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let k = self.key_for(doc);
        if self.map.entry(k).or_default().insert(id.clone()) {
            self.stats.entries += 1;
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let k = self.key_for(doc);
        if let Some(set) = self.map.get_mut(&k) {
            if set.remove(id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Walks the keys whose leading component falls in `range`.
    /// Returns the matching ids and the number of keys examined.
    pub fn scan(&mut self, range: &KeyRange) -> (Vec<DocumentId>, usize) {
        self.stats.scans += 1;
        let start: Bound<Vec<IndexKey>> = match &range.lower {
            Bound::Included(k) | Bound::Excluded(k) => Bound::Included(vec![k.clone()]),
            Bound::Unbounded => Bound::Unbounded,
        };
        let mut examined = 0usize;
        let mut out = Vec::new();
        for (key, ids) in self.map.range((start, Bound::Unbounded)) {
            let Some(lead) = key.first() else { continue };
            if range.excluded_lower(lead) {
                continue;
            }
            if !range.below_upper(lead) {
                break;
            }
            examined += 1;
            out.extend(ids.iter().cloned());
        }
        (out, examined)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub spec: IndexSpec,
    pub stats: IndexStats,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: BTreeMap<String, BTreeIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an index; returns its name and whether it was newly created.
    ///
    /// # Errors
    /// Returns an error for an empty, oversized or duplicated key list.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<(String, bool), DbError> {
        spec.validate()?;
        let name = spec.name();
        if self.indexes.contains_key(&name) {
            return Ok((name, false));
        }
        self.indexes.insert(name.clone(), BTreeIndex::new(spec));
        Ok((name, true))
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.indexes
            .values()
            .map(|i| IndexDescriptor {
                name: i.name.clone(),
                spec: i.spec.clone(),
                stats: i.stats.clone(),
            })
            .collect()
    }

    /// Picks the first index (by name) whose leading field the filter constrains.
    #[must_use]
    pub fn choose(&self, filter: &Filter) -> Option<(String, KeyRange)> {
        self.indexes.values().find_map(|idx| {
            let lead = idx.spec.leading_field()?;
            range_for_field(filter, lead).map(|r| (idx.name.clone(), r))
        })
    }

    /// Bounds for a forced index; an unconstrained leading field scans the whole index.
    ///
    /// # Errors
    /// Returns an error if no index has the given name.
    pub fn range_for_hint(&self, name: &str, filter: &Filter) -> Result<KeyRange, DbError> {
        let idx = self
            .indexes
            .get(name)
            .ok_or_else(|| DbError::QueryError(format!("hint refers to unknown index: {name}")))?;
        let lead = idx.spec.leading_field().unwrap_or_default();
        Ok(range_for_field(filter, lead).unwrap_or_else(KeyRange::full))
    }
}

pub fn index_insert_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.insert(doc, id);
    }
}

pub fn index_remove_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.remove(doc, id);
    }
}

/// Derives leading-key bounds from comparisons on `field` in the top-level conjunction.
fn range_for_field(filter: &Filter, field: &str) -> Option<KeyRange> {
    let preds: Vec<&Filter> = match filter {
        Filter::And(fs) => fs.iter().collect(),
        f => vec![f],
    };
    let mut range = KeyRange::full();
    let mut constrained = false;
    for p in preds {
        let Filter::Cmp { path, op, value } = p else { continue };
        if path != field {
            continue;
        }
        let k = key_from_bson(Some(value));
        match op {
            CmpOp::Eq => {
                return Some(KeyRange { lower: Bound::Included(k.clone()), upper: Bound::Included(k) });
            }
            CmpOp::Gt if range.lower == Bound::Unbounded => range.lower = Bound::Excluded(k),
            CmpOp::Gte if range.lower == Bound::Unbounded => range.lower = Bound::Included(k),
            CmpOp::Lt if range.upper == Bound::Unbounded => range.upper = Bound::Excluded(k),
            CmpOp::Lte if range.upper == Bound::Unbounded => range.upper = Bound::Included(k),
            _ => continue,
        }
        constrained = true;
    }
    constrained.then_some(range)
}
