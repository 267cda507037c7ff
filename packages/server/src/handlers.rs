//! HTTP handler functions for the envwatch API.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use envwatch_query::{DerivedView, ReportQueryEngine, compute_stats, reports_to_csv};
use envwatch_report_models::{
    NewReport, Report, StatusPatch,
    community::{NewComment, NewCommunityPost},
};
use envwatch_server_models::{
    ApiHealth, ApiLoginRequired, ApiRefresh, ApiReports, ReportQueryParams, SummarizeRequest,
    SummarizeResponse,
};
use envwatch_session::MirrorError;
use envwatch_store::StoreError;
use serde_json::json;

use crate::{AppState, identity::session_from_request};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/reports`
///
/// Returns the display set for the given filters, or the search results if
/// `q` is present. Filters are ignored while searching.
pub async fn list_reports(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let snapshot = state.mirror.snapshot().await;
    match derive_view(&snapshot.reports, &params) {
        Ok(view) => HttpResponse::Ok().json(ApiReports {
            revision: snapshot.revision,
            mode: view.mode,
            total: view.display.len(),
            reports: view.display,
        }),
        Err(message) => bad_request(&message),
    }
}

/// `POST /api/reports`
pub async fn submit_report(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewReport>,
) -> HttpResponse {
    let session = session_from_request(&req);
    match state
        .mirror
        .submit_report(&session, body.into_inner())
        .await
    {
        Ok(report) => HttpResponse::Created().json(report),
        Err(e) => mirror_error_response(e),
    }
}

/// `PATCH /api/reports/{id}/status`
///
/// Administrators only. The change is kept locally even if saving it
/// fails; the failure surfaces through `/api/notifications`.
pub async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<StatusPatch>,
) -> HttpResponse {
    let session = session_from_request(&req);
    match state
        .mirror
        .update_status(&session, &path, body.into_inner())
        .await
    {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => mirror_error_response(e),
    }
}

/// `GET /api/stats`
///
/// Aggregates over the whole collection, regardless of any filter.
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.mirror.snapshot().await;
    HttpResponse::Ok().json(compute_stats(&snapshot.reports, Utc::now()))
}

/// `GET /api/reports/export.csv`
pub async fn export_csv(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let snapshot = state.mirror.snapshot().await;
    let view = match derive_view(&snapshot.reports, &params) {
        Ok(view) => view,
        Err(message) => return bad_request(&message),
    };

    match reports_to_csv(&view.display) {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=\"reports.csv\"",
            ))
            .body(csv),
        Err(e) => {
            log::error!("CSV export failed: {e}");
            internal_error("Export failed")
        }
    }
}

/// `GET /api/reports/map.geojson`
///
/// One point feature per placeable report in the display set.
pub async fn export_geojson(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let snapshot = state.mirror.snapshot().await;
    let view = match derive_view(&snapshot.reports, &params) {
        Ok(view) => view,
        Err(message) => return bad_request(&message),
    };

    match envwatch_map::display_set_to_geojson_string(&view.display, &state.missing_coordinates) {
        Ok(body) => HttpResponse::Ok()
            .content_type("application/geo+json")
            .body(body),
        Err(e) => {
            log::error!("GeoJSON export failed: {e}");
            internal_error("Export failed")
        }
    }
}

/// `GET /api/community`
pub async fn list_posts(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.mirror.snapshot().await;
    HttpResponse::Ok().json(snapshot.posts.as_slice())
}

/// `POST /api/community`
pub async fn create_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewCommunityPost>,
) -> HttpResponse {
    let session = session_from_request(&req);
    match state.mirror.create_post(&session, body.into_inner()).await {
        Ok(post) => HttpResponse::Created().json(post),
        Err(e) => mirror_error_response(e),
    }
}

/// `POST /api/community/{id}/like`
pub async fn like_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let session = session_from_request(&req);
    match state.mirror.like_post(&session, &path).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(e) => mirror_error_response(e),
    }
}

/// `POST /api/community/{id}/comments`
pub async fn add_comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<NewComment>,
) -> HttpResponse {
    let session = session_from_request(&req);
    match state
        .mirror
        .add_comment(&session, &path, body.into_inner())
        .await
    {
        Ok(post) => HttpResponse::Created().json(post),
        Err(e) => mirror_error_response(e),
    }
}

/// `POST /api/summarize`
///
/// Asks the configured LLM for an analysis of arbitrary report text.
pub async fn summarize(
    state: web::Data<AppState>,
    body: web::Json<SummarizeRequest>,
) -> HttpResponse {
    let Some(provider) = &state.ai else {
        return HttpResponse::ServiceUnavailable()
            .json(json!({"error": "No AI provider is configured"}));
    };
    if body.text.trim().is_empty() {
        return bad_request("Text must not be empty");
    }

    match envwatch_ai::summarize(provider.as_ref(), &body.text).await {
        Some(analysis) => HttpResponse::Ok().json(SummarizeResponse { analysis }),
        None => HttpResponse::BadGateway().json(json!({"error": "AI summarization failed"})),
    }
}

/// `GET /api/notifications`
///
/// Returns and clears the caller's notifications produced since their
/// last call.
pub async fn notifications(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = session_from_request(&req);
    let user = match session.require_user("/notifications") {
        Ok(user) => user,
        Err(redirect) => return mirror_error_response(MirrorError::LoginRequired(redirect)),
    };
    let Ok(mut receiver) = state.notifications.lock() else {
        log::error!("Notification receiver mutex poisoned");
        return internal_error("Notifications unavailable");
    };
    HttpResponse::Ok().json(receiver.drain_for(&user.id))
}

/// `POST /api/refresh`
///
/// Reloads the mirror from the store. Disagreements are logged.
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    match state.mirror.refresh().await {
        Ok(summary) => HttpResponse::Ok().json(ApiRefresh {
            reports: summary.reports,
            posts: summary.posts,
            divergences: summary.divergences.len(),
        }),
        Err(e) => mirror_error_response(e),
    }
}

fn derive_view(reports: &[Report], params: &ReportQueryParams) -> Result<DerivedView, String> {
    let mut engine = ReportQueryEngine::new(reports.to_vec());
    engine.set_filters(params.filters()?);
    engine.set_search(params.search());
    Ok(engine.view().clone())
}

fn mirror_error_response(e: MirrorError) -> HttpResponse {
    match e {
        MirrorError::LoginRequired(redirect) => HttpResponse::Unauthorized().json(ApiLoginRequired {
            error: "Login required".to_string(),
            login_required: true,
            login_path: redirect.login_path,
            return_to: redirect.return_to,
        }),
        MirrorError::Forbidden => {
            HttpResponse::Forbidden().json(json!({"error": "Administrator privileges required"}))
        }
        MirrorError::NotFound { .. } | MirrorError::Store(StoreError::NotFound { .. }) => {
            HttpResponse::NotFound().json(json!({"error": e.to_string()}))
        }
        MirrorError::Store(StoreError::Invalid(invalid)) => bad_request(&invalid.to_string()),
        MirrorError::Store(e) => {
            log::error!("Store operation failed: {e}");
            internal_error(&e.to_string())
        }
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"error": message}))
}

fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({"error": message}))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use chrono::Utc;
    use envwatch_query_models::ViewMode;
    use envwatch_report_models::{Report, ReportStatus};
    use envwatch_store::MemoryStore;
    use serde_json::{Value, json};

    use crate::{
        AppState, configure,
        identity::{USER_ADMIN_HEADER, USER_ID_HEADER, USER_NAME_HEADER},
    };

    fn report(id: &str, title: &str, kind: &str) -> Report {
        let new: envwatch_report_models::NewReport = serde_json::from_value(json!({
            "title": title,
            "type": kind,
            "severity": "medium",
            "location": "Han River Park",
            "coordinates": {"latitude": 37.52, "longitude": 126.93},
        }))
        .unwrap();
        new.into_report(id.to_string(), Utc::now())
    }

    async fn state_with(reports: Vec<Report>) -> actix_web::web::Data<AppState> {
        let state = AppState::new(Arc::new(MemoryStore::with_reports(reports)), None);
        state.mirror.refresh().await.unwrap();
        actix_web::web::Data::new(state)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/health").to_request(),
        )
        .await;
        assert_eq!(body["healthy"], true);
    }

    #[actix_web::test]
    async fn search_overrides_filters() {
        let state = state_with(vec![
            report("1", "Oil on the river", "water"),
            report("2", "Burning trash", "air"),
        ])
        .await;
        let app = app!(state);

        let filtered: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/reports?type=air").to_request(),
        )
        .await;
        assert_eq!(filtered["mode"], json!(ViewMode::Filtered));
        assert_eq!(filtered["total"], 1);
        assert_eq!(filtered["reports"][0]["id"], "2");

        let searched: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/reports?type=air&q=river")
                .to_request(),
        )
        .await;
        assert_eq!(searched["mode"], json!(ViewMode::Search));
        assert_eq!(searched["total"], 1);
        assert_eq!(searched["reports"][0]["id"], "1");
    }

    #[actix_web::test]
    async fn bad_filter_is_a_bad_request() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/reports?severity=extreme").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/reports?status=bogus").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn anonymous_submit_is_told_to_log_in() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/reports")
                .set_json(json!({"title": "Smoke", "type": "air", "severity": "low"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["loginRequired"], true);
        assert_eq!(body["loginPath"], "/login");
    }

    #[actix_web::test]
    async fn submitted_report_is_listed_with_reporter() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/reports")
                .insert_header((USER_ID_HEADER, "u-1"))
                .insert_header((USER_NAME_HEADER, "Kim"))
                .set_json(json!({"title": "Smoke", "type": "air", "severity": "low"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["reporterName"], "Kim");

        let listing: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/reports").to_request(),
        )
        .await;
        assert_eq!(listing["total"], 1);
        assert_eq!(listing["reports"][0]["id"], created["id"]);
    }

    #[actix_web::test]
    async fn status_change_requires_admin() {
        let state = state_with(vec![report("1", "Oil on the river", "water")]).await;
        let app = app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/reports/1/status")
                .insert_header((USER_ID_HEADER, "u-1"))
                .set_json(json!({"status": "resolved"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/reports/1/status")
                .insert_header((USER_ID_HEADER, "admin"))
                .insert_header((USER_ADMIN_HEADER, "true"))
                .set_json(json!({"status": "처리완료"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Report = test::read_body_json(resp).await;
        assert_eq!(updated.status, ReportStatus::Resolved);

        let stats: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/stats").to_request(),
        )
        .await;
        assert_eq!(stats["resolved"], 1);
    }

    #[actix_web::test]
    async fn unknown_report_is_not_found() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/reports/missing/status")
                .insert_header((USER_ID_HEADER, "admin"))
                .insert_header((USER_ADMIN_HEADER, "1"))
                .set_json(json!({"status": "resolved"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn exports_follow_the_display_set() {
        let state = state_with(vec![
            report("1", "Oil on the river", "water"),
            report("2", "Burning trash", "air"),
        ])
        .await;
        let app = app!(state);

        let csv = test::call_and_read_body(
            &app,
            test::TestRequest::get()
                .uri("/api/reports/export.csv?type=water")
                .to_request(),
        )
        .await;
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        assert!(csv.starts_with("id,title,location"));
        assert_eq!(csv.lines().count(), 2);

        let geojson: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/reports/map.geojson")
                .to_request(),
        )
        .await;
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn community_post_like_and_comment() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);

        let post: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/community")
                .insert_header((USER_ID_HEADER, "u-1"))
                .insert_header((USER_NAME_HEADER, "Lee"))
                .set_json(json!({
                    "title": "Cleanup",
                    "content": "Saturday 9am",
                    "category": "meeting",
                }))
                .to_request(),
        )
        .await;
        assert_eq!(post["author"], "Lee");
        let id = post["id"].as_str().unwrap().to_string();

        let liked: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/community/{id}/like"))
                .insert_header((USER_ID_HEADER, "u-2"))
                .to_request(),
        )
        .await;
        assert_eq!(liked["likes"], 1);

        let commented: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/community/{id}/comments"))
                .insert_header((USER_ID_HEADER, "u-2"))
                .insert_header((USER_NAME_HEADER, "Park"))
                .set_json(json!({"content": "Count me in"}))
                .to_request(),
        )
        .await;
        assert_eq!(commented["comments"], 1);
        assert_eq!(commented["commentList"][0]["author"], "Park");

        let posts: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/community").to_request(),
        )
        .await;
        assert_eq!(posts[0]["likes"], 1);
        assert_eq!(posts[0]["comments"], 1);
    }

    #[actix_web::test]
    async fn summarize_without_provider_is_unavailable() {
        let state = state_with(Vec::new()).await;
        let app = app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/summarize")
                .set_json(json!({"text": "Dumped tires by the stream"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn notifications_drain_once_per_user() {
        let state = state_with(vec![report("1", "Oil on the river", "water")]).await;
        let app = app!(state);
        test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/reports/1/status")
                .insert_header((USER_ID_HEADER, "admin"))
                .insert_header((USER_ADMIN_HEADER, "yes"))
                .set_json(json!({"status": "in_progress"}))
                .to_request(),
        )
        .await;

        let anonymous = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/notifications").to_request(),
        )
        .await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let other: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/notifications")
                .insert_header((USER_ID_HEADER, "u-2"))
                .to_request(),
        )
        .await;
        assert!(other.as_array().unwrap().is_empty());

        let first: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/notifications")
                .insert_header((USER_ID_HEADER, "admin"))
                .to_request(),
        )
        .await;
        assert_eq!(first.as_array().unwrap().len(), 1);
        assert_eq!(first[0]["level"], "success");
        assert!(first[0].get("recipient").is_none());

        let second: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/notifications")
                .insert_header((USER_ID_HEADER, "admin"))
                .to_request(),
        )
        .await;
        assert!(second.as_array().unwrap().is_empty());
    }
}
