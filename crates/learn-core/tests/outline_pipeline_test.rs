//! Integration tests for plan submission and the outline pipeline.

use learn_core::GenerationError;
use learn_core::llm::ScriptedProvider;
use learn_core::plan::{OutlineOutcome, PlanRequest, create_plan, generate_plan_content};
use learn_db::models::{LearningIntent, PlanMode, PlanStatus};
use learn_db::queries::{chapters, plans};
use learn_test_utils::{create_test_db, drop_test_db};
use uuid::Uuid;

const OUTLINE: &str = r#"```json
{
  "intent": "learning",
  "curriculum_strategy": "Start with the pieces. Then show how they move.",
  "chapters": [
    {"title": "Pistons", "mental_model": "A bicycle pump", "key_takeaway": "Pressure does work"},
    {"title": "Spark", "mental_model": "A lighter", "key_takeaway": "Timing matters"},
    {"title": "Exhaust", "mental_model": "Breathing out", "key_takeaway": "Flow limits power"}
  ],
  "next_steps": ["Turbochargers", "Diesel cycles"]
}
```"#;

#[tokio::test]
async fn outline_is_generated_once_and_then_short_circuits() {
    let (pool, db_name) = create_test_db().await;
    let plan = create_plan(&pool, &PlanRequest::new("How car engines work"))
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Generating);

    let llm = ScriptedProvider::with_replies([OUTLINE, OUTLINE]);

    let first = generate_plan_content(&pool, &llm, plan.id).await.unwrap();
    let OutlineOutcome::Generated { plan: updated, chapters: inserted } = first else {
        panic!("expected a fresh outline");
    };
    assert_eq!(inserted.len(), 3);
    assert_eq!(updated.status, PlanStatus::StructureReady);
    assert_eq!(updated.intent, Some(LearningIntent::Learning));
    assert_eq!(updated.next_steps, vec!["Turbochargers", "Diesel cycles"]);

    let second = generate_plan_content(&pool, &llm, plan.id).await.unwrap();
    assert!(matches!(second, OutlineOutcome::AlreadyGenerated));
    assert_eq!(llm.call_count(), 1, "second run must not call the model");
    assert_eq!(
        chapters::count_chapters_for_plan(&pool, plan.id).await.unwrap(),
        3
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_runs_do_not_duplicate_chapters() {
    let (pool, db_name) = create_test_db().await;
    let plan = create_plan(&pool, &PlanRequest::new("Tides")).await.unwrap();
    let llm = ScriptedProvider::with_replies([OUTLINE, OUTLINE]);

    let (a, b) = tokio::join!(
        generate_plan_content(&pool, &llm, plan.id),
        generate_plan_content(&pool, &llm, plan.id),
    );
    let generated = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| matches!(o, OutlineOutcome::Generated { .. }))
        .count();
    assert_eq!(generated, 1);
    assert_eq!(
        chapters::count_chapters_for_plan(&pool, plan.id).await.unwrap(),
        3
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn missing_chapters_leaves_plan_generating() {
    let (pool, db_name) = create_test_db().await;
    let plan = create_plan(&pool, &PlanRequest::new("Tides")).await.unwrap();
    let llm = ScriptedProvider::with_replies([r#"{"intent": "learning", "chapters": []}"#]);

    let err = generate_plan_content(&pool, &llm, plan.id).await.unwrap_err();
    assert!(matches!(err, GenerationError::MissingChapters));

    let reloaded = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, PlanStatus::Generating);
    assert_eq!(
        chapters::count_chapters_for_plan(&pool, plan.id).await.unwrap(),
        0
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn failed_outline_record_leaves_no_chapters_behind() {
    let (pool, db_name) = create_test_db().await;
    let plan = create_plan(&pool, &PlanRequest::new("Tides")).await.unwrap();
    plans::advance_plan_status(&pool, plan.id, PlanStatus::StructureReady)
        .await
        .unwrap();
    let solving = OUTLINE.replace("\"learning\"", "\"solving\"");
    let llm = ScriptedProvider::with_replies([solving.clone(), solving]);

    // The metadata write is refused, so the chapter insert rolls back too.
    generate_plan_content(&pool, &llm, plan.id).await.unwrap_err();
    assert_eq!(
        chapters::count_chapters_for_plan(&pool, plan.id).await.unwrap(),
        0
    );

    // With no orphaned chapters the guard does not short-circuit, and a
    // fresh plan keeps the detected intent.
    let fresh = create_plan(&pool, &PlanRequest::new("Currents")).await.unwrap();
    let outcome = generate_plan_content(&pool, &llm, fresh.id).await.unwrap();
    let OutlineOutcome::Generated { plan: stored, .. } = outcome else {
        panic!("expected a fresh outline");
    };
    assert_eq!(stored.intent, Some(LearningIntent::Solving));
    assert_eq!(stored.next_steps, vec!["Turbochargers", "Diesel cycles"]);
    assert_eq!(llm.call_count(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn non_english_outline_is_translated_before_insert() {
    let (pool, db_name) = create_test_db().await;
    let request = PlanRequest {
        language: "Spanish".into(),
        mode: PlanMode::Story,
        ..PlanRequest::new("Volcanoes")
    };
    let plan = create_plan(&pool, &request).await.unwrap();
    let llm = ScriptedProvider::with_replies([
        r#"{"chapters": [{"title": "The mountain wakes", "mental_model": "A pot", "key_takeaway": "Pressure"}]}"#,
        r#"{"chapter_0_title": "La montaña despierta", "chapter_0_key_takeaway": "Presión"}"#,
    ]);

    generate_plan_content(&pool, &llm, plan.id).await.unwrap();

    let stored = chapters::list_chapters_for_plan(&pool, plan.id).await.unwrap();
    assert_eq!(stored[0].title, "La montaña despierta");
    assert_eq!(stored[0].mental_model, "A pot");
    assert_eq!(stored[0].key_takeaway, "Presión");
    assert_eq!(llm.call_count(), 2);
    assert!(llm.requests()[0].messages[1].text().contains("scenes"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn validation_and_not_found() {
    let (pool, db_name) = create_test_db().await;

    let err = create_plan(&pool, &PlanRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidRequest(_)));

    let request = PlanRequest {
        document: Some("bm90IGEgcGRm".into()),
        ..PlanRequest::new("My notes")
    };
    let err = create_plan(&pool, &request).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidRequest(_)));

    let missing = Uuid::new_v4();
    let err = generate_plan_content(&pool, &ScriptedProvider::new(), missing)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::PlanNotFound(id) if id == missing));

    pool.close().await;
    drop_test_db(&db_name).await;
}
