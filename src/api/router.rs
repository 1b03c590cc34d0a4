//! HTTP router.
//!
//! Returns a composable `Router` with every endpoint nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger
//!
//! Public routes (signup, login, directory listings, health) skip auth but
//! are still rate limited and audited. Serve with
//! `into_make_service_with_connect_info::<SocketAddr>()` so anonymous
//! clients are limited per peer address.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router around shared state.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit → Auth → Audit (innermost) → Handler
    //
    // Path params use `:param` syntax (axum 0.7).
    let protected = Router::new()
        .route("/logout", post(endpoints::auth::logout))
        .route("/dashboard", get(endpoints::auth::dashboard))
        // Profiles
        .route(
            "/patient/profile",
            get(endpoints::profiles::patient_profile).put(endpoints::profiles::update_patient_profile),
        )
        .route(
            "/doctor/profile",
            get(endpoints::profiles::doctor_profile).put(endpoints::profiles::update_doctor_profile),
        )
        .route(
            "/admin/profile",
            get(endpoints::profiles::admin_profile).put(endpoints::profiles::update_admin_profile),
        )
        .route("/doctors", get(endpoints::profiles::doctors))
        .route("/doctors/available", get(endpoints::profiles::available_doctors))
        // Appointments
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route("/appointments/:id/confirm", post(endpoints::appointments::confirm))
        .route("/appointments/:id/status", get(endpoints::appointments::status))
        .route("/appointments/:id/cancel", post(endpoints::appointments::cancel))
        .route("/appointments/:id/complete", post(endpoints::appointments::complete))
        .route("/appointments/:id/delete", post(endpoints::appointments::delete))
        .route("/appointments/:id/pay", post(endpoints::appointments::pay))
        .route("/appointments/:id/payments", get(endpoints::appointments::payments))
        // Clinical
        .route("/patients/:id/medical-history", post(endpoints::clinical::add_record))
        .route("/medical-history/:id", get(endpoints::clinical::history))
        .route("/prescriptions/:id", get(endpoints::clinical::prescriptions))
        .route("/prescribe/:appointment_id", post(endpoints::clinical::prescribe))
        // Billing
        .route(
            "/billing",
            get(endpoints::billing::list).post(endpoints::billing::create),
        )
        // Admin console
        .route("/admin/add-doctor", post(endpoints::admin::add_doctor))
        .route("/admin/remove-doctor/:id", post(endpoints::admin::remove_doctor))
        .route(
            "/admin/specializations",
            get(endpoints::admin::specializations).post(endpoints::admin::create_specialization),
        )
        .route(
            "/admin/specializations/:id/delete",
            post(endpoints::admin::delete_specialization),
        )
        .route("/admin/users", get(endpoints::admin::users))
        .route("/admin/patients", get(endpoints::admin::patients))
        .route("/admin/patients/:id", get(endpoints::admin::patient_detail))
        // Directory writes
        .route("/facilities/new", post(endpoints::directory::create_facility))
        .route("/resources/new", post(endpoints::directory::create_resource))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/signup", post(endpoints::auth::signup))
        .route("/login", post(endpoints::auth::login))
        .route("/facilities", get(endpoints::directory::facilities))
        .route("/resources", get(endpoints::directory::resources))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::identity::create_identity;
    use crate::models::Role;
    use crate::payment_gateway::mock::MockGateway;

    struct Harness {
        core: Arc<CoreState>,
        gateway: Arc<MockGateway>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(gateway: MockGateway) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db_path = dir.path().join("hospital.db").to_string_lossy().to_string();
            let config = AppConfig::from_lookup(|key| match key {
                "EHOSPITAL_DB_PATH" => Some(db_path.clone()),
                "EHOSPITAL_PASSWORD_ITERATIONS" => Some("1000".into()),
                _ => None,
            })
            .unwrap();
            let gateway = Arc::new(gateway);
            let core = Arc::new(CoreState::with_gateway(config, gateway.clone()));

            let conn = core.open_db().unwrap();
            create_identity(&conn, &core.hasher, "root", None, "rootpass1", Role::Admin).unwrap();

            Self {
                core,
                gateway,
                _dir: dir,
            }
        }

        fn app(&self) -> Router {
            api_router(self.core.clone())
        }

        async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
            let req = request(method, uri, token, body, peer(1));
            self.app().oneshot(req).await.unwrap()
        }

        async fn login(&self, username: &str, password: &str) -> String {
            let response = self
                .call(
                    "POST",
                    "/api/login",
                    None,
                    Some(json!({"username": username, "password": password})),
                )
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            json_body(response).await["token"].as_str().unwrap().to_string()
        }

        /// Admin adds drbob; alice signs up. Returns (admin, alice, drbob tokens, doctor profile id).
        async fn seed_clinic(&self) -> (String, String, String, String) {
            let admin = self.login("root", "rootpass1").await;

            let response = self
                .call(
                    "POST",
                    "/api/admin/add-doctor",
                    Some(&admin),
                    Some(json!({
                        "username": "drbob",
                        "password": "bobpass12",
                        "name": "Bob",
                        "availability": {"Wednesday": "09:00-17:00"}
                    })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            let doctor_id = json_body(response).await["id"].as_str().unwrap().to_string();

            let response = self
                .call(
                    "POST",
                    "/api/signup",
                    None,
                    Some(json!({
                        "username": "alice",
                        "password": "alicepass1",
                        "password_confirm": "alicepass1"
                    })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);

            let alice = self.login("alice", "alicepass1").await;
            let drbob = self.login("drbob", "bobpass12").await;
            (admin, alice, drbob, doctor_id)
        }

        async fn book(&self, patient: &str, doctor_id: &str) -> String {
            let response = self
                .call(
                    "POST",
                    "/api/appointments",
                    Some(patient),
                    Some(json!({"doctor_id": doctor_id, "date": "2024-05-01", "time": "10:00:00"})),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            json_body(response).await["id"].as_str().unwrap().to_string()
        }
    }

    fn peer(host: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, host], 40_000))
    }

    /// Build a request as the server would hand it over, peer address included.
    fn request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        from: SocketAddr,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let mut req = builder.body(body).unwrap();
        req.extensions_mut().insert(ConnectInfo(from));
        req
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let response = h.call("GET", "/api/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let response = h.call("GET", "/api/appointments", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = h.call("GET", "/api/appointments", Some("bogus"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn login_reports_dashboard_and_logout_revokes() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let response = h
            .call(
                "POST",
                "/api/login",
                None,
                Some(json!({"username": "root", "password": "rootpass1"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["role"], "admin");
        assert_eq!(json["dashboard"], "admin_dashboard");
        let token = json["token"].as_str().unwrap().to_string();

        let response = h.call("GET", "/api/dashboard", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.call("POST", "/api/logout", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.call("GET", "/api/dashboard", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn repeated_bad_passwords_lock_the_account() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        for _ in 0..5 {
            let response = h
                .call(
                    "POST",
                    "/api/login",
                    None,
                    Some(json!({"username": "root", "password": "wrong-pass"})),
                )
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = h
            .call(
                "POST",
                "/api/login",
                None,
                Some(json!({"username": "root", "password": "rootpass1"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn anonymous_clients_are_limited_per_peer() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let app = h.app();
        let noisy = peer(7);

        for _ in 0..100 {
            let response = app
                .clone()
                .oneshot(request("GET", "/api/health", None, None, noisy))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .clone()
            .oneshot(request("GET", "/api/health", None, None, noisy))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));

        // An unknown bearer token does not buy a fresh bucket.
        let response = app
            .clone()
            .oneshot(request("GET", "/api/health", Some("randomjunk123"), None, noisy))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Other clients can still log in.
        let login = json!({"username": "root", "password": "rootpass1"});
        let response = app
            .clone()
            .oneshot(request("POST", "/api/login", None, Some(login), peer(8)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let token = json_body(response).await["token"].as_str().unwrap().to_string();

        // A live session is counted on its own, even from the noisy address.
        let response = app
            .clone()
            .oneshot(request("GET", "/api/dashboard", Some(&token), None, noisy))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let body = json!({"username": "root", "password": "whatever1", "password_confirm": "whatever1"});
        let response = h.call("POST", "/api/signup", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn booking_confirm_and_pay_flow() {
        let h = Harness::new(MockGateway::succeeding("ch_42"));
        let (admin, alice, drbob, doctor_id) = h.seed_clinic().await;
        let appt = h.book(&alice, &doctor_id).await;

        // Doctor sees it on their schedule.
        let response = h.call("GET", "/api/appointments", Some(&drbob), None).await;
        let json = json_body(response).await;
        assert_eq!(json["appointments"].as_array().unwrap().len(), 1);

        let uri = format!("/api/appointments/{appt}/confirm");
        let response = h.call("POST", &uri, Some(&alice), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "confirmed");

        let response = h.call("POST", &uri, Some(&alice), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = h
            .call(
                "POST",
                &format!("/api/appointments/{appt}/pay"),
                Some(&alice),
                Some(json!({"amount": "50.00", "payment_token": "tok_visa"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert_eq!(json["payment"]["external_charge_id"], "ch_42");
        assert_eq!(json["payment"]["amount"], "50.00");
        assert_eq!(h.gateway.call_count(), 1);

        let response = h
            .call("GET", &format!("/api/appointments/{appt}/payments"), Some(&admin), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["payments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn declined_charge_returns_gateway_message() {
        let h = Harness::new(MockGateway::declining("Your card was declined."));
        let (_admin, alice, _drbob, doctor_id) = h.seed_clinic().await;
        let appt = h.book(&alice, &doctor_id).await;

        let response = h
            .call(
                "POST",
                &format!("/api/appointments/{appt}/pay"),
                Some(&alice),
                Some(json!({"amount": "50.00", "payment_token": "tok_bad"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json_body(response).await["error"]["message"], "Your card was declined.");

        let response = h
            .call("GET", &format!("/api/appointments/{appt}/payments"), Some(&alice), None)
            .await;
        assert_eq!(json_body(response).await["payments"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn other_patients_cannot_see_appointment() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let (_admin, alice, _drbob, doctor_id) = h.seed_clinic().await;
        let appt = h.book(&alice, &doctor_id).await;

        let body = json!({"username": "mallory", "password": "mallory12", "password_confirm": "mallory12"});
        h.call("POST", "/api/signup", None, Some(body)).await;
        let mallory = h.login("mallory", "mallory12").await;

        let response = h
            .call("GET", &format!("/api/appointments/{appt}/status"), Some(&mallory), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = h
            .call("POST", &format!("/api/appointments/{appt}/confirm"), Some(&mallory), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn doctor_records_history_and_prescribes() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let (admin, alice, drbob, doctor_id) = h.seed_clinic().await;
        let appt = h.book(&alice, &doctor_id).await;

        let response = h.call("GET", "/api/admin/patients", Some(&admin), None).await;
        let patients = json_body(response).await;
        let alice_id = patients["users"][0]["id"].as_str().unwrap().to_string();

        let response = h
            .call(
                "POST",
                &format!("/api/patients/{alice_id}/medical-history"),
                Some(&drbob),
                Some(json!({"diagnosis": "Flu", "treatment_plan": "Rest"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = h
            .call(
                "POST",
                &format!("/api/patients/{alice_id}/medical-history"),
                Some(&alice),
                Some(json!({"diagnosis": "Self-diagnosed", "treatment_plan": "None"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = h
            .call(
                "POST",
                &format!("/api/prescribe/{appt}"),
                Some(&drbob),
                Some(json!({"medication_name": "Oseltamivir", "dosage_instructions": "75mg twice daily"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = h
            .call("GET", &format!("/api/medical-history/{alice_id}"), Some(&alice), None)
            .await;
        let json = json_body(response).await;
        assert_eq!(json["records"][0]["diagnosis"], "Flu");

        let response = h
            .call("GET", &format!("/api/prescriptions/{alice_id}"), Some(&alice), None)
            .await;
        let json = json_body(response).await;
        assert_eq!(json["prescriptions"][0]["medication_name"], "Oseltamivir");
    }

    #[tokio::test]
    async fn removing_doctor_ends_their_sessions() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let (admin, _alice, drbob, doctor_id) = h.seed_clinic().await;

        let response = h
            .call("POST", &format!("/api/admin/remove-doctor/{doctor_id}"), Some(&admin), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["sessions_revoked"], 1);

        let response = h.call("GET", "/api/doctor/profile", Some(&drbob), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn directory_listings_are_public_but_writes_are_not() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let (admin, alice, _drbob, _doctor_id) = h.seed_clinic().await;

        let facility = json!({"name": "Ward A", "location": "Floor 2", "department": "Cardiology"});
        let response = h
            .call("POST", "/api/facilities/new", Some(&alice), Some(facility.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = h
            .call("POST", "/api/facilities/new", Some(&admin), Some(facility))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = h.call("GET", "/api/facilities", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["facilities"][0]["name"], "Ward A");
        assert_eq!(json["facilities"][0]["resource_available"], true);
    }

    #[tokio::test]
    async fn requests_are_audited_with_identity() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let admin = h.login("root", "rootpass1").await;
        h.call("GET", "/api/admin/users", Some(&admin), None).await;

        let entries = h.core.audit_entries();
        let hit = entries
            .iter()
            .find(|e| e.action == "GET /api/admin/users")
            .expect("admin listing audited");
        assert!(hit.identity_id.is_some());
        assert_eq!(hit.entity, "status:200");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = Harness::new(MockGateway::succeeding("ch_1"));
        let response = h.call("GET", "/nonexistent", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
