//! Single round-trip paging with an aggregation `$facet` stage.
//!
//! The pipeline matches the filter once, then splits into two facets: one
//! counting every match, one sorting, skipping and limiting to the page.

use bson::{Bson, Document, doc};

use uowlayer_core::{
    error::{UnitOfWorkError, UnitOfWorkResult},
    page::PaginationParams,
    query::Sort,
};

use crate::query::sort_document;

pub(crate) const COUNT_FACET: &str = "countFacet";
pub(crate) const DATA_FACET: &str = "dataFacet";
const COUNT_FIELD: &str = "count";

/// Builds the `$match` + `$facet` pipeline for one page.
pub(crate) fn facet_pipeline(
    filter: Document,
    sort: &Sort,
    params: &PaginationParams,
) -> UnitOfWorkResult<Vec<Document>> {
    params.validate()?;
    if sort.is_empty() {
        return Err(UnitOfWorkError::InvalidArgument(
            "a sort is required for aggregated paging".to_string(),
        ));
    }

    let skip = i64::try_from(params.offset()).unwrap_or(i64::MAX);
    let limit = i64::try_from(params.page_size).unwrap_or(i64::MAX);

    Ok(vec![
        doc! { "$match": filter },
        doc! {
            "$facet": {
                COUNT_FACET: [{ "$count": COUNT_FIELD }],
                DATA_FACET: [
                    { "$sort": sort_document(sort) },
                    { "$skip": skip },
                    { "$limit": limit },
                ],
            }
        },
    ])
}

/// Reads the total count and the page documents out of the facet result.
///
/// An empty match produces an empty count facet, read as zero.
pub(crate) fn read_facets(result: Option<Document>) -> UnitOfWorkResult<(u64, Vec<Document>)> {
    let Some(result) = result else {
        return Ok((0, Vec::new()));
    };

    let total_count = match result.get_array(COUNT_FACET) {
        Ok(counts) => match counts.first() {
            Some(Bson::Document(count)) => read_count(count)?,
            Some(other) => return Err(malformed(format!("unexpected count entry {}", other))),
            None => 0,
        },
        Err(_) => return Err(malformed(format!("missing {}", COUNT_FACET))),
    };

    let items = result
        .get_array(DATA_FACET)
        .map_err(|_| malformed(format!("missing {}", DATA_FACET)))?
        .iter()
        .map(|item| match item {
            Bson::Document(document) => Ok(document.clone()),
            other => Err(malformed(format!("unexpected data entry {}", other))),
        })
        .collect::<UnitOfWorkResult<Vec<_>>>()?;

    Ok((total_count, items))
}

fn read_count(count: &Document) -> UnitOfWorkResult<u64> {
    match count.get(COUNT_FIELD) {
        Some(Bson::Int32(value)) => Ok(u64::try_from(*value).unwrap_or_default()),
        Some(Bson::Int64(value)) => Ok(u64::try_from(*value).unwrap_or_default()),
        Some(other) => Err(malformed(format!("unexpected count {}", other))),
        None => Ok(0),
    }
}

fn malformed(detail: String) -> UnitOfWorkError {
    UnitOfWorkError::Backend(format!("malformed paging result: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_matches_once_then_facets() {
        let pipeline = facet_pipeline(
            doc! { "status": { "$eq": "open" } },
            &Sort::ascending("_id"),
            &PaginationParams::new(2, 10),
        )
        .unwrap();

        assert_eq!(
            pipeline,
            vec![
                doc! { "$match": { "status": { "$eq": "open" } } },
                doc! {
                    "$facet": {
                        "countFacet": [{ "$count": "count" }],
                        "dataFacet": [
                            { "$sort": { "_id": 1 } },
                            { "$skip": 20_i64 },
                            { "$limit": 10_i64 },
                        ],
                    }
                },
            ]
        );
    }

    #[test]
    fn pipeline_requires_a_sort_and_a_page_size() {
        let unsorted = facet_pipeline(Document::new(), &Sort::default(), &PaginationParams::new(0, 10));
        let empty = facet_pipeline(Document::new(), &Sort::ascending("_id"), &PaginationParams::new(0, 0));

        assert!(matches!(unsorted, Err(UnitOfWorkError::InvalidArgument(_))));
        assert!(matches!(empty, Err(UnitOfWorkError::InvalidArgument(_))));
    }

    #[test]
    fn facets_yield_count_and_items() {
        let result = doc! {
            "countFacet": [{ "count": 25 }],
            "dataFacet": [{ "_id": 21 }, { "_id": 22 }],
        };

        let (total_count, items) = read_facets(Some(result)).unwrap();

        assert_eq!(total_count, 25);
        assert_eq!(items, vec![doc! { "_id": 21 }, doc! { "_id": 22 }]);
    }

    #[test]
    fn empty_count_facet_reads_as_zero() {
        let result = doc! { "countFacet": [], "dataFacet": [] };

        assert_eq!(read_facets(Some(result)).unwrap(), (0, Vec::new()));
        assert_eq!(read_facets(None).unwrap(), (0, Vec::new()));
    }

    #[test]
    fn missing_facets_are_reported() {
        let error = read_facets(Some(doc! { "countFacet": [] })).unwrap_err();

        assert!(matches!(error, UnitOfWorkError::Backend(_)));
    }
}
