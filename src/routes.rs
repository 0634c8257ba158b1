use crate::{
    api::{attendance, correction},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use anyhow::Context;
use std::sync::Arc;

pub type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-client-IP limiter shared by every worker.
pub fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("Invalid rate limit configuration")?;
    Ok(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: Arc<Limiter>) {
    // Every route needs a bearer token; AuthUser enforces it per handler.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(limiter)
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::my_attendance)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/team
                    .service(
                        web::resource("/team").route(web::get().to(attendance::team_attendance)),
                    ),
            )
            .service(
                web::scope("/corrections")
                    // /corrections
                    .service(
                        web::resource("").route(web::post().to(correction::request_correction)),
                    )
                    .service(
                        web::resource("/mine").route(web::get().to(correction::my_corrections)),
                    )
                    .service(
                        web::resource("/pending")
                            .route(web::get().to(correction::pending_corrections)),
                    )
                    // /corrections/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(correction::approve_correction)),
                    )
                    // /corrections/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(correction::reject_correction)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::testing::{SECRET, token};
    use crate::engine::testing::harness;
    use crate::models::TokenType;
    use actix_web::http::StatusCode;
    use actix_web::web::Data;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    const EMPLOYEE: u64 = 7;
    const ADMIN: u64 = 1;

    macro_rules! app {
        ($h:expr) => {{
            let config = Config::for_tests(SECRET);
            let limiter = Arc::new(build_limiter(config.rate_protected_per_min).unwrap());
            test::init_service(
                App::new()
                    .app_data(Data::new($h.engine.clone()))
                    .app_data(Data::new(config.clone()))
                    .configure(move |cfg| configure(cfg, &config, limiter)),
            )
            .await
        }};
    }

    fn request(method: &str, uri: &str, user_id: u64, role: u8) -> test::TestRequest {
        let req = match method {
            "POST" => test::TestRequest::post(),
            "PUT" => test::TestRequest::put(),
            _ => test::TestRequest::get(),
        };
        req.uri(uri)
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .insert_header((
                "Authorization",
                format!("Bearer {}", token(user_id, role, TokenType::Access)),
            ))
    }

    fn office() -> Value {
        json!({ "location": { "latitude": 23.7808, "longitude": 90.2792 } })
    }

    #[actix_web::test]
    async fn check_in_twice_conflicts() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        let req = request("POST", "/api/attendance/check-in", EMPLOYEE, 2)
            .set_json(office())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["date"], "2024-03-01");

        let req = request("POST", "/api/attendance/check-in", EMPLOYEE, 2)
            .set_json(office())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Already checked in on 2024-03-01");
    }

    #[actix_web::test]
    async fn bad_location_is_a_validation_error() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        let req = request("POST", "/api/attendance/check-in", EMPLOYEE, 2)
            .set_json(json!({ "location": { "latitude": 91.0, "longitude": 0.0 } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        let req = test::TestRequest::get()
            .uri("/api/attendance")
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn admin_routes_refuse_employees() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        for uri in ["/api/corrections/pending", "/api/attendance/team"] {
            let req = request("GET", uri, EMPLOYEE, 2).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
        }

        let req = request("PUT", "/api/corrections/1/approve", EMPLOYEE, 2).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn forgotten_check_out_is_corrected_by_an_admin() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        let req = request("POST", "/api/attendance/check-in", EMPLOYEE, 2)
            .set_json(office())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        h.clock.set("2024-03-01T22:00:00Z");
        assert_eq!(h.engine.sweep_once().await.unwrap(), 1);

        let req = request("POST", "/api/attendance/check-out", EMPLOYEE, 2)
            .set_json(office())
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CONFLICT
        );

        let req = request("POST", "/api/corrections", EMPLOYEE, 2)
            .set_json(json!({
                "date": "2024-03-01",
                "requested_check_out": "2024-03-01T17:00:00Z",
                "reason": "Forgot to check out"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "pending");
        assert_eq!(created["expired"], false);
        let id = created["id"].as_u64().unwrap();

        let req = request("GET", "/api/corrections/pending", ADMIN, 1).to_request();
        let pending: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let req = request("PUT", &format!("/api/corrections/{id}/approve"), ADMIN, 1).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let decided: Value = test::read_body_json(resp).await;
        assert_eq!(decided["correction"]["status"], "approved");
        assert_eq!(decided["correction"]["reviewed_by"], ADMIN);
        assert_eq!(decided["record"]["status"], "valid");
        assert_eq!(decided["record"]["total_hours"], 8.0);

        let req = request("PUT", &format!("/api/corrections/{id}/reject"), ADMIN, 1)
            .set_json(json!({ "comments": "too late" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CONFLICT
        );

        let req = request("GET", "/api/corrections/mine", EMPLOYEE, 2).to_request();
        let mine: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mine[0]["status"], "approved");
    }

    #[actix_web::test]
    async fn reject_requires_comments() {
        let h = harness("2024-03-01T09:00:00Z");
        let app = app!(h);

        let req = request("POST", "/api/attendance/check-in", EMPLOYEE, 2)
            .set_json(office())
            .to_request();
        test::call_service(&app, req).await;
        let req = request("POST", "/api/corrections", EMPLOYEE, 2)
            .set_json(json!({
                "date": "2024-03-01",
                "requested_check_in": "2024-03-01T08:30:00Z",
                "reason": "Badge reader was down"
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_u64().unwrap();

        let req = request("PUT", &format!("/api/corrections/{id}/reject"), ADMIN, 1)
            .set_json(json!({ "comments": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Comments are required for rejection");
    }
}
