//! Full repository flow against a running Milvus and embedding service.
//!
//! Run with `cargo test -p domain_vector_repository --test milvus_live_test -- --ignored`.
//! Connection settings come from the usual environment variables
//! (`MILVUS_HOST`, `EMBEDDING_SERVER_HOST`, `EMBEDDING_DIMENSION`, ...).

use domain_vector_repository::{
    Environment, FieldDeclaration, FromEnv, IndexDeclaration, InsertMode, OneOrMany,
    RepositoryConfig, VectorError, VectorRepository, init_tracing,
};
use test_utils::TestDataBuilder;
use test_utils::assertions::{assert_same_records, assert_some};

fn live_config() -> RepositoryConfig {
    RepositoryConfig::from_env().unwrap_or_else(|_| RepositoryConfig::new(768))
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Milvus and an embedding service"]
async fn test_live_repository_flow() {
    init_tracing(&Environment::from_env());

    let data = TestDataBuilder::from_test_name("test_live_repository_flow");
    let collection = data.collection("live");
    let repository = VectorRepository::new(live_config()).unwrap();

    repository
        .clear_collections(Some(collection.clone().into()))
        .await
        .unwrap();
    repository
        .provision(
            &collection,
            &[
                FieldDeclaration::string("user_id").unwrap(),
                FieldDeclaration::string("group_id").unwrap(),
                FieldDeclaration::vector("embedding").unwrap(),
            ],
            &[
                IndexDeclaration::new("user_id").unwrap(),
                IndexDeclaration::new("group_id").unwrap(),
            ],
        )
        .await
        .unwrap();

    let alice = data.record(&[("user_id", "alice"), ("group_id", "team")]);
    let bob = data.record(&[("user_id", "bob"), ("group_id", "team")]);

    // Single insert echoes the caller's data
    let inserted = repository
        .insert(
            &collection,
            "This is test data".into(),
            alice.clone().into(),
            InsertMode::Single,
        )
        .await
        .unwrap();
    assert_eq!(inserted, OneOrMany::One(alice.clone()));

    // Single mode with a list is rejected
    let err = repository
        .insert(
            &collection,
            "Vector repository".into(),
            vec![alice.clone()].into(),
            InsertMode::Single,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VectorError::Validation(_)));

    // Batch insert keeps order
    let batch = vec![bob.clone(), bob.clone()];
    let inserted = repository
        .insert(
            &collection,
            vec!["My name is Bob.", "I am a developer."].into(),
            batch.clone().into(),
            InsertMode::Batch,
        )
        .await
        .unwrap();
    assert_eq!(inserted, OneOrMany::Many(batch));

    // Batch mode with a single record is rejected
    let err = repository
        .insert(&collection, "Test data".into(), alice.clone().into(), InsertMode::Batch)
        .await
        .unwrap_err();
    assert!(matches!(err, VectorError::Validation(_)));

    let all = repository.find(&collection, None).await.unwrap();
    assert_same_records(&all, &[alice.clone(), bob.clone(), bob.clone()], "find all");

    let bobs = repository
        .find(&collection, Some("user_id == 'bob'"))
        .await
        .unwrap();
    assert_same_records(&bobs, &[bob.clone(), bob.clone()], "find bob");

    let one = repository
        .find_one(&collection, Some("user_id == 'alice'"))
        .await
        .unwrap();
    assert_eq!(assert_some(one, "find_one alice"), alice);

    let deleted = repository
        .delete(&collection, Some("user_id == 'alice'"))
        .await
        .unwrap();
    assert_eq!(deleted, vec![alice]);

    let extra = vec![
        data.record(&[("user_id", "carol"), ("group_id", "team")]),
        data.record(&[("user_id", "dave"), ("group_id", "team")]),
        data.record(&[("user_id", "erin"), ("group_id", "ops")]),
        data.record(&[("user_id", "frank"), ("group_id", "ops")]),
    ];
    let texts: Vec<String> = ["AWS", "Solutions", "Architect", "DevOps"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    repository
        .insert_batch(&collection, &texts, &extra)
        .await
        .unwrap();

    let nearest = repository
        .retrieval(&collection, "This is test retrieval sentence.", None, Some(3))
        .await
        .unwrap();
    assert_eq!(nearest.len(), 3);

    let filtered = repository
        .retrieval(
            &collection,
            "This is test retrieval sentence.",
            Some("group_id == 'ops'"),
            Some(5),
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 2);

    repository
        .clear_collections(Some(collection.into()))
        .await
        .unwrap();
}
