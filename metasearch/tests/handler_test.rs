//! Query handler behaviour against in-memory store and scripted aggregation.

mod common;

use common::{facet_branch, harness, Reply};
use metasearch::query::{Resource, SearchRequest, SortingParameter};
use metasearch::Error;
use mongodb::bson::{doc, Document};
use serde_json::json;

fn animal_results() -> serde_json::Value {
    json!({
        "hits": [
            {"id_": "dog1", "content": {"species": "dog", "eats": "meat"}},
            {"id_": "dog2", "content": {"species": "dog", "eats": ["meat", "bones"]}}
        ],
        "count": 2,
        "facets": [
            {"key": "species", "name": "Species", "options": [{"value": "dog", "count": 2}]},
            {"key": "eats", "name": "Food", "options": [
                {"value": "bones", "count": 1},
                {"value": "meat", "count": 2}
            ]}
        ]
    })
}

fn sort_stage(pipeline: &[Document]) -> Option<Document> {
    facet_branch(pipeline, "hits")
        .into_iter()
        .find_map(|stage| stage.get_document("$sort").ok().cloned())
}

#[tokio::test]
async fn test_unknown_class_is_rejected_before_aggregation() {
    let h = harness(vec![]);

    let err = h
        .handler
        .handle_query(SearchRequest::new("Plants"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ClassNotConfigured(ref name) if name == "Plants"));
    assert!(err.is_client_error());
    assert_eq!(h.aggregator.call_count(), 0);
}

#[tokio::test]
async fn test_search_returns_validated_results() {
    let h = harness(vec![Reply::Results(animal_results())]);

    let results = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_filter("species", "dog"))
        .await
        .unwrap();

    assert_eq!(results.count, 2);
    assert_eq!(results.hits.len(), 2);
    assert_eq!(results.facets[0].options.len(), 1);
    assert_eq!(results.facets[0].options[0].count, results.count);
}

#[tokio::test]
async fn test_empty_collection_yields_empty_results() {
    let h = harness(vec![]);

    let results = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_query("anything"))
        .await
        .unwrap();

    assert_eq!(results.count, 0);
    assert!(results.hits.is_empty());
    assert!(results.facets.is_empty());
}

#[tokio::test]
async fn test_query_without_sorts_sorts_by_relevance_then_id() {
    let h = harness(vec![]);

    h.handler
        .handle_query(SearchRequest::new("Animals").with_query("lasagna"))
        .await
        .unwrap();

    let pipeline = h.aggregator.last_pipeline();
    assert_eq!(
        sort_stage(&pipeline).unwrap(),
        doc! { "score": { "$meta": "textScore" }, "id_": 1 }
    );
}

#[tokio::test]
async fn test_id_tiebreak_is_appended_once() {
    let h = harness(vec![]);

    h.handler
        .handle_query(
            SearchRequest::new("Animals").with_sort(SortingParameter::descending("species")),
        )
        .await
        .unwrap();
    assert_eq!(
        sort_stage(&h.aggregator.last_pipeline()).unwrap(),
        doc! { "content.species": -1, "id_": 1 }
    );

    h.handler
        .handle_query(
            SearchRequest::new("Animals")
                .with_sort(SortingParameter::descending("id_"))
                .with_sort(SortingParameter::ascending("species")),
        )
        .await
        .unwrap();
    assert_eq!(
        sort_stage(&h.aggregator.last_pipeline()).unwrap(),
        doc! { "id_": -1, "content.species": 1 }
    );
}

#[tokio::test]
async fn test_selected_fields_project_id_first() {
    let h = harness(vec![]);

    h.handler
        .handle_query(SearchRequest::new("Dataset"))
        .await
        .unwrap();

    let projection = facet_branch(&h.aggregator.last_pipeline(), "hits")
        .into_iter()
        .find_map(|stage| stage.get_document("$project").ok().cloned())
        .unwrap();
    assert_eq!(projection, doc! { "id_": 1, "content.type": 1 });
}

#[tokio::test]
async fn test_missing_index_is_recreated_and_retried_once() {
    let h = harness(vec![Reply::MissingIndex, Reply::Results(animal_results())]);

    let results = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_query("dog"))
        .await
        .unwrap();

    assert_eq!(results.count, 2);
    assert_eq!(h.aggregator.call_count(), 2);
    assert_eq!(h.store.recreate_count(), 1);

    // a later successful search does not recreate again
    h.aggregator.push(Reply::Results(animal_results()));
    h.handler
        .handle_query(SearchRequest::new("Animals").with_query("dog"))
        .await
        .unwrap();
    assert_eq!(h.store.recreate_count(), 1);
}

#[tokio::test]
async fn test_missing_index_twice_is_a_search_error() {
    let h = harness(vec![Reply::MissingIndex, Reply::MissingIndex]);

    let err = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_query("dog"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Search(_)));
    assert_eq!(h.aggregator.call_count(), 2);
    assert_eq!(h.store.recreate_count(), 1);
}

#[tokio::test]
async fn test_other_aggregation_errors_are_not_retried() {
    let h = harness(vec![Reply::Failure("$unwind failed".to_string())]);

    let err = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_filter("species", "cat"))
        .await
        .unwrap_err();

    match err {
        Error::Search(message) => {
            assert!(message.contains("$unwind failed"));
            assert!(message.contains("class_name=Animals"));
            assert!(message.contains("species=cat"));
        }
        other => panic!("expected search error, got {:?}", other),
    }
    assert_eq!(h.aggregator.call_count(), 1);
    assert_eq!(h.store.recreate_count(), 0);
}

#[tokio::test]
async fn test_failed_recreation_is_a_search_error() {
    let h = harness(vec![Reply::MissingIndex, Reply::Results(animal_results())]);
    h.store
        .fail_recreation
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h
        .handler
        .handle_query(SearchRequest::new("Animals").with_query("dog"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Search(_)));
    assert_eq!(h.aggregator.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_results_fail_validation() {
    let h = harness(vec![Reply::Results(json!({
        "hits": [],
        "count": 1,
        "facets": [{"key": "age", "name": "Age", "options": [{"value": 7, "count": 1}]}]
    }))]);

    let err = h
        .handler
        .handle_query(SearchRequest::new("Animals"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(h.aggregator.call_count(), 1);
}

#[tokio::test]
async fn test_load_is_an_upsert() {
    let h = harness(vec![]);
    let first = Resource::from_json("cat1", json!({"species": "cat", "eats": "fish"})).unwrap();
    let second = Resource::from_json("cat1", json!({"species": "cat", "eats": "mice"})).unwrap();

    h.handler.load_resource(&first, "Animals").await.unwrap();
    h.handler.load_resource(&second, "Animals").await.unwrap();

    let stored = h.store.resources("Animals");
    assert_eq!(stored, vec![second]);
    assert!(h.store.ensure_count() >= 1);
}

#[tokio::test]
async fn test_load_into_unknown_class() {
    let h = harness(vec![]);
    let resource = Resource::from_json("rose", json!({"color": "red"})).unwrap();

    let err = h.handler.load_resource(&resource, "Plants").await.unwrap_err();

    assert!(matches!(err, Error::ClassNotConfigured(_)));
    assert_eq!(h.store.ensure_count(), 0);
}

#[tokio::test]
async fn test_delete_removes_exactly_one_resource() {
    let h = harness(vec![]);
    for id in ["a", "b", "c"] {
        let resource = Resource::from_json(id, json!({"species": "cat"})).unwrap();
        h.handler.load_resource(&resource, "Animals").await.unwrap();
    }

    h.handler.delete_resource("b", "Animals").await.unwrap();
    let ids: Vec<String> = h
        .store
        .resources("Animals")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["a", "c"]);

    let err = h.handler.delete_resource("zzz", "Animals").await.unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
    assert_eq!(h.store.resources("Animals").len(), 2);

    let err = h.handler.delete_resource("a", "Plants").await.unwrap_err();
    assert!(matches!(err, Error::ClassNotConfigured(_)));
}
