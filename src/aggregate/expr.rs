use crate::errors::DbError;
use crate::query::{as_f64, get_path};
use bson::{Bson, Document as BsonDocument};

/// Value expression evaluated against one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `"$field.path"`
    Field(String),
    Literal(Bson),
    Floor(Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Vec<Expr>),
    Add(Vec<Expr>),
    /// Embedded document whose values are expressions, e.g. a compound group key.
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn field(path: &str) -> Self {
        Self::Field(path.to_string())
    }

    pub fn lit(v: impl Into<Bson>) -> Self {
        Self::Literal(v.into())
    }

    /// # Errors
    /// Returns an error for non-numeric arithmetic operands or division by zero.
    pub fn eval(&self, doc: &BsonDocument) -> Result<Bson, DbError> {
        match self {
            Self::Field(path) => Ok(get_path(doc, path).cloned().unwrap_or(Bson::Null)),
            Self::Literal(v) => Ok(v.clone()),
            Self::Floor(inner) => match inner.eval(doc)? {
                Bson::Null => Ok(Bson::Null),
                v @ (Bson::Int32(_) | Bson::Int64(_)) => Ok(v),
                Bson::Double(f) => Ok(Bson::Double(f.floor())),
                other => Err(non_numeric("$floor", &other)),
            },
            Self::Divide(a, b) => {
                let (Some(x), Some(y)) = (numeric("$divide", a.eval(doc)?)?, numeric("$divide", b.eval(doc)?)?) else {
                    return Ok(Bson::Null);
                };
                let (x, y) = (num_f64(&x), num_f64(&y));
                if y == 0.0 {
                    return Err(DbError::PipelineError("$divide by zero".into()));
                }
                Ok(Bson::Double(x / y))
            }
            Self::Subtract(a, b) => {
                let (Some(x), Some(y)) = (numeric("$subtract", a.eval(doc)?)?, numeric("$subtract", b.eval(doc)?)?) else {
                    return Ok(Bson::Null);
                };
                Ok(match (as_int(&x), as_int(&y)) {
                    (Some(i), Some(j)) => i.checked_sub(j).map_or(Bson::Double(num_f64(&x) - num_f64(&y)), int_result),
                    _ => Bson::Double(num_f64(&x) - num_f64(&y)),
                })
            }
            Self::Multiply(args) => fold_numeric("$multiply", args, doc, 1, i64::checked_mul, |a, b| a * b),
            Self::Add(args) => fold_numeric("$add", args, doc, 0, i64::checked_add, |a, b| a + b),
            Self::Object(fields) => {
                let mut out = BsonDocument::new();
                for (k, e) in fields {
                    out.insert(k.clone(), e.eval(doc)?);
                }
                Ok(Bson::Document(out))
            }
        }
    }
}

fn non_numeric(op: &str, v: &Bson) -> DbError {
    DbError::PipelineError(format!("{op} only supports numeric types, not {:?}", v.element_type()))
}

/// `Ok(None)` for null/missing operands, which make the whole expression null.
fn numeric(op: &str, v: Bson) -> Result<Option<Bson>, DbError> {
    match v {
        Bson::Null | Bson::Undefined => Ok(None),
        n @ (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => Ok(Some(n)),
        other => Err(non_numeric(op, &other)),
    }
}

fn num_f64(v: &Bson) -> f64 {
    as_f64(v).unwrap_or(f64::NAN)
}

fn as_int(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Integer results narrow to int32 when they fit.
pub(crate) fn int_result(i: i64) -> Bson {
    i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32)
}

fn fold_numeric(
    op: &str,
    args: &[Expr],
    doc: &BsonDocument,
    identity: i64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Bson, DbError> {
    #[allow(clippy::cast_precision_loss)]
    let mut float = identity as f64;
    let mut int = Some(identity);
    for a in args {
        let Some(v) = numeric(op, a.eval(doc)?)? else {
            return Ok(Bson::Null);
        };
        float = float_op(float, num_f64(&v));
        int = match (int, as_int(&v)) {
            (Some(acc), Some(i)) => int_op(acc, i),
            _ => None,
        };
    }
    Ok(int.map_or(Bson::Double(float), int_result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn decade_key_arithmetic() {
        let d = doc! {"published_year": 1949};
        let bucket = Expr::Floor(Box::new(Expr::Divide(
            Box::new(Expr::field("published_year")),
            Box::new(Expr::lit(10)),
        )));
        assert_eq!(bucket.eval(&d).unwrap(), Bson::Double(194.0));
        let decade = Expr::Multiply(vec![bucket, Expr::lit(10)]);
        assert_eq!(decade.eval(&d).unwrap(), Bson::Double(1940.0));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let d = doc! {"a": 6, "b": 7};
        let e = Expr::Multiply(vec![Expr::field("a"), Expr::field("b")]);
        assert_eq!(e.eval(&d).unwrap(), Bson::Int32(42));
        let e = Expr::Subtract(Box::new(Expr::field("a")), Box::new(Expr::field("b")));
        assert_eq!(e.eval(&d).unwrap(), Bson::Int32(-1));
    }

    #[test]
    fn missing_operands_yield_null_and_bad_types_error() {
        let d = doc! {"title": "Dune"};
        let e = Expr::Add(vec![Expr::field("price"), Expr::lit(1)]);
        assert_eq!(e.eval(&d).unwrap(), Bson::Null);
        let e = Expr::Add(vec![Expr::field("title"), Expr::lit(1)]);
        assert!(e.eval(&d).is_err());
        let e = Expr::Divide(Box::new(Expr::lit(1)), Box::new(Expr::lit(0)));
        assert!(e.eval(&d).is_err());
    }
}
