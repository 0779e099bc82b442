use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;

use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, Order,
    Projection, SortSpec,
};
use crate::document::ID_FIELD;

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            // `$ne` also matches documents lacking the field
            (None, CmpOp::Ne) => true,
            (None, _) => false,
            (Some(v), CmpOp::Eq) => values_equal(v, value),
            (Some(v), CmpOp::Ne) => !values_equal(v, value),
            (Some(v), CmpOp::Gt) => compare_bson(v, value) == Ordering::Greater,
            (Some(v), CmpOp::Gte) => compare_bson(v, value) != Ordering::Less,
            (Some(v), CmpOp::Lt) => compare_bson(v, value) == Ordering::Less,
            (Some(v), CmpOp::Lte) => compare_bson(v, value) != Ordering::Greater,
        },
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let va = get_path(a, &s.field);
        let vb = get_path(b, &s.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if matches!(s.order, Order::Asc) { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| values_equal(v, x))
}

/// Resolves a dotted path through embedded documents.
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Equality that treats int32, int64 and double holding the same number as equal.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order shared with index keys: numbers compare by value (`-0.0 == 0.0`, NaN
/// above every other number), other types by [`type_rank`].
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return OrderedFloat(x).cmp(&OrderedFloat(y));
    }
    match (a, b) {
        (T::String(x) | T::Symbol(x), T::String(y) | T::Symbol(y)) => x.cmp(y),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Cross-type order. Values of the same rank without a payload comparison above are
/// equal to each other. Variant order of `IndexKey` follows these ranks.
pub(crate) fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) => 2,
        T::Decimal128(_) => 3,
        T::String(_) | T::Symbol(_) => 4,
        T::Document(_) => 5,
        T::Array(_) => 6,
        T::Binary(_) => 7,
        T::ObjectId(_) => 8,
        T::Boolean(_) => 9,
        T::DateTime(_) => 10,
        T::Timestamp(_) => 11,
        T::RegularExpression(_) => 12,
        T::DbPointer(_) | T::JavaScriptCode(_) | T::JavaScriptCodeWithScope(_) => 13,
        T::MaxKey => 255,
    }
}

/// Shapes a result view; the stored document is untouched. Dotted fields select and
/// remove nested values.
pub fn apply_projection(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include { fields, include_id } => {
            let mut out = BsonDocument::new();
            if *include_id && let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD, id.clone());
            }
            for f in fields.iter().take(MAX_PROJECTION_FIELDS) {
                if f == ID_FIELD {
                    continue;
                }
                if let Some(v) = get_path(doc, f) {
                    set_path(&mut out, f, v.clone());
                }
            }
            out
        }
        Projection::Exclude { fields } => {
            let mut out = doc.clone();
            for f in fields.iter().take(MAX_PROJECTION_FIELDS) {
                remove_path(&mut out, f);
            }
            out
        }
    }
}

/// Writes `value` at a dotted path, creating intermediate documents. A non-document
/// value in the way is replaced.
pub(crate) fn set_path(doc: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, BsonDocument::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

pub(crate) fn remove_path(doc: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}
