//! Translation of filter expressions and sorts into MongoDB query syntax.

use bson::{Bson, Document, doc};

use uowlayer_core::{
    error::{UnitOfWorkError, UnitOfWorkResult},
    query::{Expr, FieldOp, FilterVisitor, Sort, SortDirection},
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates `filter` into a query document.
    pub(crate) fn translate(filter: &Expr) -> UnitOfWorkResult<Document> {
        MongoQueryTranslator.visit_expr(filter)
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> UnitOfWorkResult<Vec<Document>> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

fn string_operand<'a>(op: &str, value: &'a Bson) -> UnitOfWorkResult<&'a str> {
    match value {
        Bson::String(value) => Ok(value),
        _ => Err(UnitOfWorkError::InvalidArgument(format!(
            "{} operator requires a string value",
            op
        ))),
    }
}

impl FilterVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = UnitOfWorkError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$and` rejects empty arrays; an empty conjunction matches everything.
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! { "$and": self.visit_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "$expr": false });
        }

        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::Array(values) => doc! { "$all": values },
                    _ => doc! { "$regex": regex::escape(string_operand("Contains", value)?) },
                },
                FieldOp::NotContains => match value {
                    Bson::Array(values) => doc! { "$nin": values },
                    _ => doc! { "$not": { "$regex": regex::escape(string_operand("NotContains", value)?) } },
                },
                FieldOp::StartsWith => {
                    doc! { "$regex": format!("^{}", regex::escape(string_operand("StartsWith", value)?)) }
                }
                FieldOp::EndsWith => {
                    doc! { "$regex": format!("{}$", regex::escape(string_operand("EndsWith", value)?)) }
                }
                FieldOp::AnyOf => doc! { "$in": value },
                FieldOp::NoneOf => doc! { "$nin": value },
            }
        })
    }
}

/// Translates `sort` into a `$sort`-style document of `1` / `-1` keys.
pub(crate) fn sort_document(sort: &Sort) -> Document {
    sort.keys()
        .iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            (key.field.clone(), Bson::Int32(direction))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uowlayer_core::query::Filter;

    #[test]
    fn match_all_translates_to_empty_query() {
        assert_eq!(MongoQueryTranslator::translate(&Filter::all()).unwrap(), Document::new());
    }

    #[test]
    fn conjunctions_nest_field_operators() {
        let filter = Filter::eq("status", "open").and(Filter::gte("total", 10));

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! {
                "$and": [
                    { "status": { "$eq": "open" } },
                    { "total": { "$gte": 10 } },
                ]
            }
        );
    }

    #[test]
    fn negation_uses_nor() {
        let filter = Filter::eq("status", "open").not();

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "$nor": [{ "status": { "$eq": "open" } }] }
        );
    }

    #[test]
    fn string_operands_are_escaped() {
        let filter = Filter::starts_with("sku", "a.b*");

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "sku": { "$regex": "^a\\.b\\*" } }
        );
    }

    #[test]
    fn string_operators_reject_other_values() {
        let error = MongoQueryTranslator::translate(&Filter::ends_with("sku", 4)).unwrap_err();

        assert!(matches!(error, UnitOfWorkError::InvalidArgument(_)));
    }

    #[test]
    fn sorts_keep_key_order() {
        let sort = Sort::descending("total").then_ascending("_id");

        let document = sort_document(&sort);

        assert_eq!(document, doc! { "total": -1, "_id": 1 });
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["total", "_id"]);
    }
}
