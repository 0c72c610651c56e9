//! Builders for individual aggregation stages. Pure functions, no I/O.

use mongodb::bson::{doc, Bson, Document};

use crate::pipeline::paths::{getfield_args, hit_path, stored_path, CONTENT_ROOT};
use crate::query::{Filter, SortOrder, SortingParameter};
use crate::schema::{FieldLabel, ID_FIELD};

/// Sort key under which the text relevance score is ordered.
pub const RELEVANCE_SORT_KEY: &str = "score";

/// Full-text match over the wildcard text index; `None` for a blank query.
pub fn text_match_stage(query: &str) -> Option<Document> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(doc! { "$match": { "$text": { "$search": query } } })
}

/// One clause per distinct filter key, AND-combined; `None` without filters.
pub fn filter_match_stage(filters: &[Filter]) -> Option<Document> {
    if filters.is_empty() {
        return None;
    }

    // group values by key, keeping the order in which keys first appear
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for filter in filters {
        match grouped.iter_mut().find(|(key, _)| *key == filter.key) {
            Some((_, values)) => {
                if !values.contains(&filter.value.as_str()) {
                    values.push(filter.value.as_str());
                }
            }
            None => grouped.push((filter.key.as_str(), vec![filter.value.as_str()])),
        }
    }

    let clauses: Vec<Document> = grouped
        .into_iter()
        .map(|(key, values)| value_in_set(&stored_path(key), &values))
        .collect();

    Some(doc! { "$match": { "$and": clauses } })
}

/// Matches documents whose field equals any of `values`, whether the field holds
/// a single string or an array of strings.
fn value_in_set(path: &str, values: &[&str]) -> Document {
    let values: Vec<Bson> = values.iter().map(|v| Bson::from(*v)).collect();
    doc! {
        "$or": [
            { "$and": [
                field_condition(path, doc! { "$type": "string" }),
                field_condition(path, doc! { "$in": values.clone() }),
            ] },
            { "$and": [
                field_condition(path, doc! { "$type": "array" }),
                field_condition(path, doc! { "$elemMatch": { "$in": values } }),
            ] },
        ]
    }
}

fn field_condition(path: &str, condition: Document) -> Document {
    let mut clause = Document::new();
    clause.insert(path, condition);
    clause
}

/// Option distribution of one facetable field.
///
/// Array values are unwound so each element is its own option. Counts are the
/// number of distinct resources per value, null values are dropped, and options
/// are ordered by value.
pub fn facet_branch(facet: &FieldLabel) -> Vec<Document> {
    let (input, field) = getfield_args(CONTENT_ROOT, &facet.key);
    let unwind_path = format!("${}", stored_path(&facet.key));

    vec![
        doc! { "$unwind": { "path": unwind_path, "preserveNullAndEmptyArrays": true } },
        doc! {
            "$group": {
                "_id": { "$getField": { "field": field, "input": input } },
                "ids": { "$addToSet": "$_id" },
            }
        },
        doc! { "$match": { "_id": { "$ne": Bson::Null } } },
        doc! { "$sort": { "_id": 1 } },
        doc! { "$project": { "_id": 0, "value": "$_id", "count": { "$size": "$ids" } } },
    ]
}

/// `$sort` specification for hits. Relevance directives are only honoured when a
/// text stage is present, since there is no text score otherwise.
pub fn sort_specification(parameters: &[SortingParameter], text_search: bool) -> Document {
    let mut sort = Document::new();
    for parameter in parameters {
        match parameter.order {
            SortOrder::Ascending => {
                sort.insert(hit_path(&parameter.field), 1);
            }
            SortOrder::Descending => {
                sort.insert(hit_path(&parameter.field), -1);
            }
            SortOrder::Relevance if text_search => {
                sort.insert(RELEVANCE_SORT_KEY, doc! { "$meta": "textScore" });
            }
            SortOrder::Relevance => {}
        }
    }
    sort
}

/// `$project` specification for hits; `None` returns every field.
pub fn projection_specification(selected_fields: &[FieldLabel]) -> Option<Document> {
    if selected_fields.is_empty() {
        return None;
    }
    let mut projection = Document::new();
    projection.insert(ID_FIELD, 1);
    for field in selected_fields {
        projection.insert(hit_path(&field.key), 1);
    }
    Some(projection)
}

/// Sorted, projected and paginated hits.
///
/// `limit` of `None` or `Some(0)` emits no `$limit` stage; a zero `skip` emits no
/// `$skip` stage.
pub fn hits_branch(
    sort: Document,
    projection: Option<Document>,
    skip: u64,
    limit: Option<u64>,
) -> Vec<Document> {
    let mut stages = vec![
        doc! { "$addFields": { "id_": "$_id" } },
        doc! { "$unset": "_id" },
    ];

    // sort before projecting so unselected fields can still be sort keys
    if !sort.is_empty() {
        stages.push(doc! { "$sort": sort });
    }
    if let Some(projection) = projection {
        stages.push(doc! { "$project": projection });
    }
    if skip > 0 {
        stages.push(doc! { "$skip": to_i64(skip) });
    }
    if let Some(limit) = limit.filter(|l| *l > 0) {
        stages.push(doc! { "$limit": to_i64(limit) });
    }

    stages
}

/// Total number of matching documents before pagination.
pub fn count_branch() -> Vec<Document> {
    vec![doc! { "$count": "total" }]
}

/// Reshape the parallel branches into `{hits, count, facets}`.
pub fn reshape_stage(facets: &[(&FieldLabel, String)]) -> Document {
    let facets: Vec<Document> = facets
        .iter()
        .map(|(label, branch)| {
            doc! {
                "key": { "$literal": label.key.as_str() },
                "name": { "$literal": label.display_name() },
                "options": format!("${}", branch),
            }
        })
        .collect();

    doc! {
        "$project": {
            "hits": 1,
            "count": { "$ifNull": [{ "$arrayElemAt": ["$count.total", 0] }, 0] },
            "facets": facets,
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
