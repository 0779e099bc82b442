use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::index::IndexSpec;
use bson::{Bson, Document as BsonDocument};

use super::eval::as_f64;
use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, Order, Projection,
    SortSpec, UpdateDoc,
};

const MAX_UPDATE_FIELDS: usize = 128;

/// Parses a JSON object into a BSON document.
///
/// # Errors
/// Returns an error if the text is not a JSON object.
pub fn json_to_document(json: &str) -> Result<BsonDocument, DbError> {
    Ok(serde_json::from_str::<BsonDocument>(json)?)
}

/// Parses a Mongo-shell style filter (`{"genre": "Fantasy", "published_year": {"$gt": 1930}}`).
///
/// # Errors
/// Returns an error on unknown operators or malformed operands.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, DbError> {
    let mut parts = Vec::new();
    for (key, value) in doc {
        match key.as_str() {
            "$and" => parts.push(Filter::And(parse_filter_list(key, value)?)),
            "$or" => parts.push(Filter::Or(parse_filter_list(key, value)?)),
            "$nor" => parts.push(Filter::Nor(parse_filter_list(key, value)?)),
            k if k.starts_with('$') => {
                return Err(DbError::QueryError(format!("unknown top-level operator: {k}")));
            }
            field => parts.extend(parse_field_condition(field, value)?),
        }
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn parse_filter_list(op: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(DbError::QueryError(format!("{op} expects an array")));
    };
    if items.is_empty() {
        return Err(DbError::QueryError(format!("{op} expects a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(DbError::QueryError(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(d: &BsonDocument) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_field_condition(field: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Document(ops) = value else {
        return Ok(vec![Filter::eq(field, value.clone())]);
    };
    if !is_operator_doc(ops) {
        return Ok(vec![Filter::eq(field, value.clone())]);
    }
    let mut out = Vec::new();
    for (op, operand) in ops {
        let path = field.to_string();
        let f = match op.as_str() {
            "$eq" => Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() },
            "$ne" => Filter::Cmp { path, op: CmpOp::Ne, value: operand.clone() },
            "$gt" => Filter::Cmp { path, op: CmpOp::Gt, value: operand.clone() },
            "$gte" => Filter::Cmp { path, op: CmpOp::Gte, value: operand.clone() },
            "$lt" => Filter::Cmp { path, op: CmpOp::Lt, value: operand.clone() },
            "$lte" => Filter::Cmp { path, op: CmpOp::Lte, value: operand.clone() },
            "$in" | "$nin" => {
                let Bson::Array(vals) = operand else {
                    return Err(DbError::QueryError(format!("{op} expects an array")));
                };
                let values: Vec<Bson> = vals.iter().take(MAX_IN_SET).cloned().collect();
                if op == "$in" { Filter::In { path, values } } else { Filter::Nin { path, values } }
            }
            "$exists" => {
                let exists = match operand {
                    Bson::Boolean(b) => *b,
                    other => as_f64(other).is_some_and(|n| n != 0.0),
                };
                Filter::Exists { path, exists }
            }
            "$not" => {
                let inner = parse_field_condition(field, operand)?;
                let inner = if inner.len() == 1 { inner.into_iter().next() } else { Some(Filter::And(inner)) };
                Filter::Not(Box::new(inner.unwrap_or(Filter::True)))
            }
            other => return Err(DbError::QueryError(format!("unknown operator: {other}"))),
        };
        out.push(f);
    }
    Ok(out)
}

/// Parses `{"$set": {..}, "$inc": {..}, "$unset": {..}}`.
///
/// # Errors
/// Returns an error on unknown operators, non-numeric `$inc` operands, empty updates,
/// or any attempt to modify `_id`.
pub fn parse_update(doc: &BsonDocument) -> Result<UpdateDoc, DbError> {
    let mut out = UpdateDoc::default();
    for (op, operand) in doc {
        let Bson::Document(fields) = operand else {
            return Err(DbError::QueryError(format!("{op} expects a document")));
        };
        for (k, v) in fields.iter().take(MAX_UPDATE_FIELDS) {
            match op.as_str() {
                "$set" => out.set.push((k.clone(), v.clone())),
                "$inc" => {
                    let by = as_f64(v)
                        .ok_or_else(|| DbError::QueryError("$inc requires numeric".into()))?;
                    out.inc.push((k.clone(), by));
                }
                "$unset" => out.unset.push(k.clone()),
                other => return Err(DbError::QueryError(format!("unknown update operator: {other}"))),
            }
        }
    }
    validate_update(&out)?;
    Ok(out)
}

/// Rejects empty updates and updates touching the store-owned identifier.
///
/// # Errors
/// See above.
pub fn validate_update(update: &UpdateDoc) -> Result<(), DbError> {
    if update.set.is_empty() && update.inc.is_empty() && update.unset.is_empty() {
        return Err(DbError::QueryError("update document is empty".into()));
    }
    let touches_id = update.set.iter().any(|(k, _)| k == ID_FIELD)
        || update.inc.iter().any(|(k, _)| k == ID_FIELD)
        || update.unset.iter().any(|k| k == ID_FIELD);
    if touches_id {
        return Err(DbError::QueryError("_id is immutable".into()));
    }
    Ok(())
}

fn flag(field: &str, v: &Bson) -> Result<bool, DbError> {
    match v {
        Bson::Boolean(b) => Ok(*b),
        other => as_f64(other)
            .map(|n| n != 0.0)
            .ok_or_else(|| DbError::QueryError(format!("projection value for {field} must be 0/1"))),
    }
}

/// Parses `{"title": 1, "author": 1, "_id": 0}` or `{"pages": 0}`.
///
/// # Errors
/// Returns an error when inclusion and exclusion are mixed (other than `_id`).
pub fn parse_projection(doc: &BsonDocument) -> Result<Projection, DbError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut include_id = true;
    for (k, v) in doc.iter().take(MAX_PROJECTION_FIELDS) {
        let on = flag(k, v)?;
        if k == ID_FIELD {
            include_id = on;
        } else if on {
            include.push(k.clone());
        } else {
            exclude.push(k.clone());
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (false, false) => {
            Err(DbError::QueryError("projection cannot mix inclusion and exclusion".into()))
        }
        (false, true) => Ok(Projection::Include { fields: include, include_id }),
        (true, _) => {
            if !include_id {
                exclude.push(ID_FIELD.to_string());
            }
            Ok(Projection::Exclude { fields: exclude })
        }
    }
}

fn direction(field: &str, v: &Bson) -> Result<Order, DbError> {
    match as_f64(v) {
        Some(n) if n == 1.0 => Ok(Order::Asc),
        Some(n) if n == -1.0 => Ok(Order::Desc),
        _ => Err(DbError::QueryError(format!("direction for {field} must be 1 or -1"))),
    }
}

/// Parses `{"price": 1}` / `{"bookCount": -1, "author": 1}`.
///
/// # Errors
/// Returns an error for directions other than 1/-1 or too many keys.
pub fn parse_sort(doc: &BsonDocument) -> Result<Vec<SortSpec>, DbError> {
    if doc.len() > MAX_SORT_FIELDS {
        return Err(DbError::QueryError(format!("sort has more than {MAX_SORT_FIELDS} keys")));
    }
    doc.iter()
        .map(|(k, v)| Ok(SortSpec { field: k.clone(), order: direction(k, v)? }))
        .collect()
}

/// Parses `{"author": 1, "published_year": 1}` into an index declaration.
///
/// # Errors
/// Returns an error for directions other than 1/-1 or an empty key list.
pub fn parse_index_keys(doc: &BsonDocument) -> Result<IndexSpec, DbError> {
    let keys = doc
        .iter()
        .map(|(k, v)| Ok((k.clone(), direction(k, v)?)))
        .collect::<Result<Vec<_>, DbError>>()?;
    let spec = IndexSpec { keys };
    spec.validate()?;
    Ok(spec)
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a filter structure.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    parse_filter(&json_to_document(json)?)
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into an update structure.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, DbError> {
    parse_update(&json_to_document(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not a valid projection.
pub fn parse_projection_json(json: &str) -> Result<Projection, DbError> {
    parse_projection(&json_to_document(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not a valid sort specification.
pub fn parse_sort_json(json: &str) -> Result<Vec<SortSpec>, DbError> {
    parse_sort(&json_to_document(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not a valid index key specification.
pub fn parse_index_keys_json(json: &str) -> Result<IndexSpec, DbError> {
    parse_index_keys(&json_to_document(json)?)
}
