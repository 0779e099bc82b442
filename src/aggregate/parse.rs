use crate::errors::DbError;
use crate::query::{as_f64, parse_filter, parse_sort};
use bson::{Bson, Document as BsonDocument};

use super::expr::Expr;
use super::stage::{Accumulator, Pipeline, ProjectField, Stage};

const MAX_STAGES: usize = 64;

fn err(msg: impl Into<String>) -> DbError {
    DbError::PipelineError(msg.into())
}

/// Parses a list of single-key stage documents (`[{"$match": {..}}, {"$group": {..}}]`).
///
/// # Errors
/// Returns an error on unknown stages, malformed operands, or non-positive limits.
pub fn parse_pipeline(stages: &[BsonDocument]) -> Result<Pipeline, DbError> {
    if stages.len() > MAX_STAGES {
        return Err(err(format!("pipeline has more than {MAX_STAGES} stages")));
    }
    let stages = stages.iter().map(parse_stage).collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline { stages })
}

/// Parses a JSON array of stage objects.
///
/// # Errors
/// Returns an error if the text is not a JSON array of valid stages.
pub fn parse_pipeline_json(json: &str) -> Result<Pipeline, DbError> {
    let docs: Vec<BsonDocument> = serde_json::from_str(json)?;
    parse_pipeline(&docs)
}

fn parse_stage(doc: &BsonDocument) -> Result<Stage, DbError> {
    let mut it = doc.iter();
    let (Some((name, body)), None) = (it.next(), it.next()) else {
        return Err(err("each stage must be a document with exactly one key"));
    };
    match name.as_str() {
        "$match" => Ok(Stage::Match(parse_filter(as_doc(name, body)?)?)),
        "$group" => parse_group(as_doc(name, body)?),
        "$sort" => {
            let spec = parse_sort(as_doc(name, body)?)?;
            if spec.is_empty() {
                return Err(err("$sort requires at least one key"));
            }
            Ok(Stage::Sort(spec))
        }
        "$skip" => Ok(Stage::Skip(count(name, body, false)?)),
        "$limit" => Ok(Stage::Limit(count(name, body, true)?)),
        "$project" => parse_project(as_doc(name, body)?),
        "$count" => match body {
            Bson::String(s) if !s.is_empty() && !s.starts_with('$') => Ok(Stage::Count(s.clone())),
            _ => Err(err("$count expects a non-empty field name")),
        },
        other => Err(err(format!("unknown stage: {other}"))),
    }
}

fn as_doc<'a>(name: &str, v: &'a Bson) -> Result<&'a BsonDocument, DbError> {
    match v {
        Bson::Document(d) => Ok(d),
        _ => Err(err(format!("{name} expects a document"))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(name: &str, v: &Bson, positive: bool) -> Result<usize, DbError> {
    let n = as_f64(v).filter(|n| n.fract() == 0.0 && *n >= 0.0);
    match n {
        Some(n) if !positive || n > 0.0 => Ok(n as usize),
        _ if positive => Err(err(format!("{name} must be a positive integer"))),
        _ => Err(err(format!("{name} must be a non-negative integer"))),
    }
}

fn parse_group(body: &BsonDocument) -> Result<Stage, DbError> {
    let Some(id) = body.get("_id") else {
        return Err(err("$group requires an _id expression"));
    };
    let id = parse_expr(id)?;
    let mut fields = Vec::new();
    for (name, spec) in body {
        if name == "_id" {
            continue;
        }
        if name.starts_with('$') || name.contains('.') {
            return Err(err(format!("invalid group output field: {name}")));
        }
        let spec = as_doc(name, spec)?;
        let mut it = spec.iter();
        let (Some((op, operand)), None) = (it.next(), it.next()) else {
            return Err(err(format!("group field {name} must use exactly one accumulator")));
        };
        let acc = match op.as_str() {
            "$sum" => Accumulator::Sum(parse_expr(operand)?),
            "$avg" => Accumulator::Avg(parse_expr(operand)?),
            "$min" => Accumulator::Min(parse_expr(operand)?),
            "$max" => Accumulator::Max(parse_expr(operand)?),
            "$first" => Accumulator::First(parse_expr(operand)?),
            "$last" => Accumulator::Last(parse_expr(operand)?),
            "$count" => Accumulator::Count,
            other => return Err(err(format!("unknown accumulator: {other}"))),
        };
        fields.push((name.clone(), acc));
    }
    Ok(Stage::Group { id, fields })
}

fn parse_project(body: &BsonDocument) -> Result<Stage, DbError> {
    if body.is_empty() {
        return Err(err("$project requires at least one field"));
    }
    let mut fields = Vec::new();
    for (name, v) in body {
        let f = match v {
            Bson::Boolean(true) => ProjectField::Include,
            Bson::Boolean(false) => ProjectField::Exclude,
            n if as_f64(n).is_some() => {
                if as_f64(n).is_some_and(|x| x == 0.0) { ProjectField::Exclude } else { ProjectField::Include }
            }
            other => ProjectField::Computed(parse_expr(other)?),
        };
        fields.push((name.clone(), f));
    }
    let includes = fields.iter().any(|(k, f)| k != "_id" && !matches!(f, ProjectField::Exclude));
    let excludes = fields.iter().any(|(k, f)| k != "_id" && matches!(f, ProjectField::Exclude));
    if includes && excludes {
        return Err(err("$project cannot mix inclusion and exclusion"));
    }
    Ok(Stage::Project(fields))
}

/// Parses an expression operand: `"$path"`, an operator document, a plain document of
/// expressions, or a literal.
///
/// # Errors
/// Returns an error on unknown operators or wrong operand counts.
pub fn parse_expr(v: &Bson) -> Result<Expr, DbError> {
    match v {
        Bson::String(s) if s.starts_with('$') => {
            let path = &s[1..];
            if path.is_empty() {
                return Err(err("empty field path"));
            }
            Ok(Expr::Field(path.to_string()))
        }
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => parse_operator(d),
        Bson::Document(d) => {
            let fields = d
                .iter()
                .map(|(k, e)| Ok((k.clone(), parse_expr(e)?)))
                .collect::<Result<Vec<_>, DbError>>()?;
            Ok(Expr::Object(fields))
        }
        other => Ok(Expr::Literal(other.clone())),
    }
}

fn parse_operator(d: &BsonDocument) -> Result<Expr, DbError> {
    let mut it = d.iter();
    let (Some((op, operand)), None) = (it.next(), it.next()) else {
        return Err(err("expression operator documents must have exactly one key"));
    };
    match op.as_str() {
        "$literal" => Ok(Expr::Literal(operand.clone())),
        "$floor" => {
            // accepts both `{"$floor": x}` and `{"$floor": [x]}`
            let inner = match operand {
                Bson::Array(a) => {
                    let [x] = a.as_slice() else {
                        return Err(err("$floor takes exactly one argument"));
                    };
                    x
                }
                x => x,
            };
            Ok(Expr::Floor(Box::new(parse_expr(inner)?)))
        }
        "$divide" | "$subtract" => {
            let [a, b] = args(op, operand)? else {
                return Err(err(format!("{op} takes exactly two arguments")));
            };
            let (a, b) = (Box::new(parse_expr(a)?), Box::new(parse_expr(b)?));
            Ok(if op == "$divide" { Expr::Divide(a, b) } else { Expr::Subtract(a, b) })
        }
        "$multiply" | "$add" => {
            let parsed = args(op, operand)?.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(if op == "$multiply" { Expr::Multiply(parsed) } else { Expr::Add(parsed) })
        }
        other => Err(err(format!("unknown expression operator: {other}"))),
    }
}

fn args<'a>(op: &str, v: &'a Bson) -> Result<&'a [Bson], DbError> {
    match v {
        Bson::Array(a) => Ok(a.as_slice()),
        _ => Err(err(format!("{op} expects an array of arguments"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, SortSpec};

    #[test]
    fn parses_decade_pipeline() {
        let p = parse_pipeline_json(
            r#"[
                {"$group": {"_id": {"$floor": {"$divide": ["$published_year", 10]}}, "bookCount": {"$sum": 1}}},
                {"$project": {"_id": 0, "decade": {"$multiply": ["$_id", 10]}, "bookCount": 1}},
                {"$sort": {"decade": 1}}
            ]"#,
        )
        .unwrap();
        assert_eq!(p.stages.len(), 3);
        assert!(matches!(&p.stages[0], Stage::Group { id: Expr::Floor(_), fields } if fields.len() == 1));
        assert_eq!(p.stages[2], Stage::Sort(vec![SortSpec::asc("decade")]));
    }

    #[test]
    fn match_stage_uses_filter_grammar() {
        let p = parse_pipeline_json(r#"[{"$match": {"genre": "Fiction"}}, {"$limit": 1}]"#).unwrap();
        assert_eq!(p.stages[0], Stage::Match(Filter::eq("genre", "Fiction")));
        assert_eq!(p.stages[1], Stage::Limit(1));
    }

    #[test]
    fn rejects_bad_stages() {
        assert!(parse_pipeline_json(r#"[{"$limit": 0}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$skip": -1}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$unwind": "$tags"}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$group": {"n": {"$sum": 1}}}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$match": {}, "$limit": 1}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$project": {"a": 1, "b": 0}}]"#).is_err());
        assert!(parse_pipeline_json(r#"[{"$group": {"_id": {"$divide": [1]}}}]"#).is_err());
    }

    #[test]
    fn binary_operators_take_two_arguments() {
        let e = parse_expr(&bson::bson!({"$subtract": ["$price", 1]})).unwrap();
        assert!(matches!(e, Expr::Subtract(_, _)));
        assert!(matches!(parse_expr(&bson::bson!({"$divide": [1, 2]})), Ok(Expr::Divide(_, _))));
        for bad in [bson::bson!({"$subtract": [1, 2, 3]}), bson::bson!({"$divide": []}), bson::bson!({"$divide": 4})] {
            assert!(matches!(parse_expr(&bad), Err(DbError::PipelineError(_))), "{bad}");
        }
    }
}
