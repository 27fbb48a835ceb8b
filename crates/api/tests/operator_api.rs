//! End-to-end tests for the `/operator` routes.
//!
//! Jobs run as real child processes of the `operator-api` binary.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post, post_json};
use serde_json::json;

fn descriptor(job_uid: &str, target: &str, job_args: &str, job_kwargs: &str) -> serde_json::Value {
    json!({
        "job_uid": job_uid,
        "job_executor": "default",
        "invoke_target": target,
        "job_args": job_args,
        "job_kwargs": job_kwargs,
    })
}

// ---------------------------------------------------------------------------
// Test: a short job runs to completion and reports success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn echo_job_completes_and_notifies_success() {
    let mut app = build_test_app();

    let response = post_json(
        &app.router,
        "/operator/add_job",
        json!([descriptor("job-1", "builtin.echo", "[\"hello\"]", "{}")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!([{ "job_uid": "job-1", "success": true }]));

    assert_eq!(app.next_callback().await, ("job-1".to_string(), true));

    let json = body_json(get(&app.router, "/operator/job_status?job_uid=job-1").await).await;
    assert_eq!(json["data"]["status"], "not_found");
    assert_eq!(json["data"]["job_uid"], "job-1");

    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a failing job reports success=false
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_job_notifies_failure() {
    let mut app = build_test_app();

    post_json(
        &app.router,
        "/operator/add_job",
        json!([descriptor("job-fail", "builtin.fail", "", "{\"code\": 3}")]),
    )
    .await;

    assert_eq!(app.next_callback().await, ("job-fail".to_string(), false));
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a long job is running until stopped, and a stop sends no callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stopped_job_is_removed_without_callback() {
    let app = build_test_app();

    post_json(
        &app.router,
        "/operator/add_job",
        json!([descriptor("job-2", "builtin.sleep", "", "{\"seconds\": 30}")]),
    )
    .await;

    let json = body_json(get(&app.router, "/operator/job_status?job_uid=job-2").await).await;
    assert_eq!(json["data"]["status"], "running");
    assert!(json["data"]["pid"].is_u64());
    assert!(json["data"]["start_time"].is_string());

    let json = body_json(get(&app.router, "/operator/all_jobs").await).await;
    assert_eq!(json["data"]["job-2"]["status"], "running");

    let response = post(&app.router, "/operator/stop_job?job_uids=job-2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!([{ "job_uid": "job-2", "success": true }]));

    let json = body_json(get(&app.router, "/operator/job_status?job_uid=job-2").await).await;
    assert_eq!(json["data"]["status"], "not_found");

    // Several monitor cycles pass without a callback.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(app.notifier.calls().is_empty());
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: adding a running job again does not spawn a second process
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_add_keeps_the_first_process() {
    let app = build_test_app();
    let job = descriptor("job-dup", "builtin.sleep", "[30]", "");

    post_json(&app.router, "/operator/add_job", json!([job.clone()])).await;
    let first = app.supervisor.process_info("job-dup").unwrap().pid;

    let json = body_json(post_json(&app.router, "/operator/add_job", json!([job])).await).await;
    assert_eq!(json["data"][0]["success"], true);
    assert_eq!(app.supervisor.process_info("job-dup").unwrap().pid, first);
    assert_eq!(app.supervisor.job_count(), 1);

    app.supervisor.stop("job-dup", Duration::from_secs(5)).await;
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: bad items fail individually, good items still start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_reports_per_item_failures() {
    let mut app = build_test_app();

    let json = body_json(
        post_json(
            &app.router,
            "/operator/add_job",
            json!([
                descriptor("bad-args", "builtin.echo", "not json", ""),
                descriptor("bad-target", "module.missing", "", ""),
                descriptor("good", "builtin.echo", "", ""),
            ]),
        )
        .await,
    )
    .await;

    let results = json["data"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["job_uid"], "bad-args");
    assert_eq!(results[0]["success"], false);
    assert!(results[0]["error"].as_str().unwrap().contains("job_args"));
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].as_str().unwrap().contains("module.missing"));
    assert_eq!(results[2]["success"], true);
    assert!(results[2].get("error").is_none());

    assert_eq!(app.next_callback().await, ("good".to_string(), true));
    assert!(app.supervisor.process_info("bad-args").is_none());
    assert!(app.supervisor.process_info("bad-target").is_none());
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: stop_job edge cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stopping_unknown_jobs_succeeds() {
    let app = build_test_app();

    let json = body_json(post(&app.router, "/operator/stop_job?job_uids=ghost-1,ghost-2").await).await;
    assert_eq!(
        json["data"],
        json!([
            { "job_uid": "ghost-1", "success": true },
            { "job_uid": "ghost-2", "success": true },
        ])
    );
    app.supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_without_job_uids_is_rejected() {
    let app = build_test_app();

    let response = post(&app.router, "/operator/stop_job").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    app.supervisor.shutdown().await;
}

#[tokio::test]
async fn empty_add_job_batch_is_rejected() {
    let app = build_test_app();

    let response = post_json(&app.router, "/operator/add_job", json!([])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(app.supervisor.job_count(), 0);
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: queries with nothing registered
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_jobs_is_empty_object_when_idle() {
    let app = build_test_app();

    let response = get(&app.router, "/operator/all_jobs").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!({}));
    app.supervisor.shutdown().await;
}

#[tokio::test]
async fn unknown_job_status_is_not_found() {
    let app = build_test_app();

    let json = body_json(get(&app.router, "/operator/job_status?job_uid=nope").await).await;
    assert_eq!(json["data"]["job_uid"], "nope");
    assert_eq!(json["data"]["status"], "not_found");
    assert!(json["data"]["message"].is_string());
    assert!(json["data"].get("pid").is_none());
    app.supervisor.shutdown().await;
}

#[tokio::test]
async fn blank_job_status_uid_is_rejected() {
    let app = build_test_app();

    let response = get(&app.router, "/operator/job_status?job_uid=%20").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    app.supervisor.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: stop_all stops every registered job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_all_stops_every_job() {
    let app = build_test_app();

    post_json(
        &app.router,
        "/operator/add_job",
        json!([
            descriptor("long-1", "builtin.sleep", "[30]", ""),
            descriptor("long-2", "builtin.sleep", "[30]", ""),
        ]),
    )
    .await;
    assert_eq!(app.supervisor.job_count(), 2);

    let json = body_json(post(&app.router, "/operator/stop_all").await).await;
    assert_eq!(
        json["data"],
        json!([
            { "job_uid": "long-1", "success": true },
            { "job_uid": "long-2", "success": true },
        ])
    );
    assert_eq!(app.supervisor.job_count(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(app.notifier.calls().is_empty());
    app.supervisor.shutdown().await;
}
