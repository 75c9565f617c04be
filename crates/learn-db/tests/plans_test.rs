//! Integration tests for `learning_plans` queries.

use learn_db::models::{LearningIntent, PlanMode, PlanStatus};
use learn_db::queries::chapters::{self, OutlineChapter};
use learn_db::queries::plans::{self, NewPlan, OutlineRecord};
use learn_test_utils::{create_test_db, drop_test_db, seed_plan};

#[tokio::test]
async fn insert_and_get_plan() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(
        &pool,
        &NewPlan {
            topic: "Quantum Physics",
            urgency: "2h",
            level: "beginner",
            language: "Spanish",
            mode: PlanMode::Story,
            document_context: Some("JVBERi0xLjQK"),
        },
    )
    .await
    .expect("insert_plan should succeed");

    assert_eq!(plan.topic, "Quantum Physics");
    assert_eq!(plan.status, PlanStatus::Generating);
    assert_eq!(plan.mode, PlanMode::Story);
    assert!(plan.intent.is_none());
    assert!(plan.next_steps.is_empty());
    assert!(plan.has_document());

    let fetched = plans::get_plan(&pool, plan.id)
        .await
        .expect("get_plan should succeed")
        .expect("plan should exist");
    assert_eq!(fetched.id, plan.id);
    assert_eq!(fetched.language, "Spanish");
    assert_eq!(fetched.document_context.as_deref(), Some("JVBERi0xLjQK"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_missing_plan_returns_none() {
    let (pool, db_name) = create_test_db().await;

    let fetched = plans::get_plan(&pool, uuid::Uuid::new_v4())
        .await
        .expect("get_plan should succeed");
    assert!(fetched.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_plans_newest_first() {
    let (pool, db_name) = create_test_db().await;

    let first = seed_plan(&pool, "Rust lifetimes").await;
    let second = seed_plan(&pool, "TCP congestion control").await;

    let listed = plans::list_plans(&pool).await.expect("list_plans");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);

    let latest = plans::latest_plan(&pool)
        .await
        .expect("latest_plan")
        .expect("some plan");
    assert_eq!(latest.id, second.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn record_outline_sets_metadata_and_status() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool, "Compilers").await;

    let steps = vec!["Parsing".to_string(), "Codegen".to_string()];
    let updated = plans::record_outline(
        &pool,
        plan.id,
        &OutlineRecord {
            intent: LearningIntent::Preparing,
            curriculum_strategy: Some("Start small. Then grow."),
            next_steps: &steps,
        },
    )
    .await
    .expect("record_outline should succeed");

    assert_eq!(updated.status, PlanStatus::StructureReady);
    assert_eq!(updated.intent, Some(LearningIntent::Preparing));
    assert_eq!(updated.next_steps, steps);

    // A second outline for the same plan is refused.
    let again = plans::record_outline(
        &pool,
        plan.id,
        &OutlineRecord {
            intent: LearningIntent::Learning,
            curriculum_strategy: None,
            next_steps: &[],
        },
    )
    .await;
    let err = again.expect_err("second outline must fail");
    assert!(err.to_string().contains("must be generating"), "got: {err}");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn store_outline_is_all_or_nothing() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool, "Compilers").await;
    let outline = vec![
        OutlineChapter {
            title: "Lexing".into(),
            mental_model: "Cutting a sentence into words".into(),
            key_takeaway: "Tokens first".into(),
        },
        OutlineChapter {
            title: "Parsing".into(),
            mental_model: "Diagramming a sentence".into(),
            key_takeaway: "Trees second".into(),
        },
    ];
    let steps = vec!["Type checking".to_string()];
    let record = OutlineRecord {
        intent: LearningIntent::Solving,
        curriculum_strategy: Some("Front end only."),
        next_steps: &steps,
    };

    // The metadata update fails once the plan has left `generating`, and
    // the chapter rows must go with it.
    plans::advance_plan_status(&pool, plan.id, PlanStatus::StructureReady)
        .await
        .unwrap();
    let err = plans::store_outline(&pool, plan.id, &outline, &record)
        .await
        .expect_err("outline for a non-generating plan must fail");
    assert!(err.to_string().contains("must be generating"), "got: {err}");
    assert_eq!(chapters::count_chapters_for_plan(&pool, plan.id).await.unwrap(), 0);

    let fresh = seed_plan(&pool, "Linkers").await;
    let (stored, inserted) = plans::store_outline(&pool, fresh.id, &outline, &record)
        .await
        .expect("store_outline should succeed");
    assert_eq!(stored.status, PlanStatus::StructureReady);
    assert_eq!(stored.intent, Some(LearningIntent::Solving));
    assert_eq!(stored.next_steps, steps);
    assert_eq!(inserted.len(), 2);
    assert_eq!(inserted[1].order, 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn advance_plan_status_never_moves_backwards() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool, "Graph theory").await;

    assert!(
        plans::advance_plan_status(&pool, plan.id, PlanStatus::Generated)
            .await
            .unwrap()
    );
    assert!(
        !plans::advance_plan_status(&pool, plan.id, PlanStatus::StructureReady)
            .await
            .unwrap()
    );
    assert!(
        !plans::advance_plan_status(&pool, plan.id, PlanStatus::Generated)
            .await
            .unwrap()
    );

    let fetched = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, PlanStatus::Generated);

    pool.close().await;
    drop_test_db(&db_name).await;
}
