use mongodb::bson::{Bson, Document};

use crate::pipeline::paths::{facet_branch_names, COUNT_BRANCH, HITS_BRANCH};
use crate::pipeline::stages;
use crate::query::{Filter, SortingParameter};
use crate::schema::FieldLabel;

/// Everything the compiler needs for one search, with defaults already applied
/// by the query handler.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    pub query: &'a str,
    pub filters: &'a [Filter],
    pub facet_fields: &'a [FieldLabel],
    pub selected_fields: &'a [FieldLabel],
    pub sorting_parameters: &'a [SortingParameter],
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Compile a search into a single aggregation pipeline.
///
/// Stage order: text match (optional), filter match (optional), one `$facet`
/// stage running the facet, hits and count branches over the same working set,
/// then the final reshape into `{hits, count, facets}`.
pub fn build_pipeline(input: &PipelineInput<'_>) -> Vec<Document> {
    let mut pipeline = Vec::with_capacity(4);

    let text_stage = stages::text_match_stage(input.query);
    let text_search = text_stage.is_some();
    pipeline.extend(text_stage);
    pipeline.extend(stages::filter_match_stage(input.filters));

    let branch_names = facet_branch_names(input.facet_fields);
    let mut branches = Document::new();
    for (facet, name) in input.facet_fields.iter().zip(&branch_names) {
        branches.insert(name.as_str(), as_bson(stages::facet_branch(facet)));
    }
    branches.insert(COUNT_BRANCH, as_bson(stages::count_branch()));
    branches.insert(
        HITS_BRANCH,
        as_bson(stages::hits_branch(
            stages::sort_specification(input.sorting_parameters, text_search),
            stages::projection_specification(input.selected_fields),
            input.skip,
            input.limit,
        )),
    );

    let mut facet_stage = Document::new();
    facet_stage.insert("$facet", branches);
    pipeline.push(facet_stage);

    let labelled: Vec<(&FieldLabel, String)> =
        input.facet_fields.iter().zip(branch_names).collect();
    pipeline.push(stages::reshape_stage(&labelled));

    tracing::trace!(?pipeline, "Compiled aggregation pipeline");

    pipeline
}

fn as_bson(stages: Vec<Document>) -> Bson {
    Bson::Array(stages.into_iter().map(Bson::Document).collect())
}
