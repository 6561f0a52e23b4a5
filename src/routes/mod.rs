use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod inspections;
pub mod machines;
pub mod portal;
pub mod public;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Public certificate surface plus the authenticated QR/signature
    // endpoints that live outside /api for historical-URL compatibility.
    let certificate_routes = Router::new()
        .route("/inspection/view/:id", get(public::view_inspection))
        .route("/machine/info/:id", get(public::machine_info))
        .route("/inspection/qr_download/:id", get(public::inspection_qr_download))
        .route("/machine/qr_download/:id", get(public::machine_qr_download))
        .route("/inspection/sign/:id", post(public::sign_inspection));

    let portal_routes = Router::new()
        .route("/counters", get(portal::counters))
        .route("/machines", get(portal::my_machines))
        .route("/machines/:id", get(portal::my_machine_detail))
        .route(
            "/machines/:id/request_inspection",
            post(portal::request_inspection),
        )
        .route("/machines/:id/upload_log", post(portal::upload_log))
        .route("/inspections", get(portal::my_inspections))
        .route("/documents", get(portal::my_documents))
        .route("/documents/download/:id", get(portal::download_document));

    let customers_routes = Router::new()
        .route(
            "/",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route("/:id", get(customers::get_customer));

    let categories_routes = Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/:id",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/:id/questions",
            get(categories::list_questions).post(categories::add_question),
        );

    let machines_routes = Router::new()
        .route(
            "/",
            get(machines::list_machines).post(machines::create_machine),
        )
        .route(
            "/:id",
            get(machines::get_machine)
                .patch(machines::update_machine)
                .delete(machines::delete_machine),
        )
        .route(
            "/:id/questions",
            get(machines::list_custom_questions).post(machines::add_custom_question),
        )
        .route("/:id/inspections", get(machines::list_inspections));

    let inspections_routes = Router::new()
        .route(
            "/",
            get(inspections::list_inspections).post(inspections::create_inspection),
        )
        .route(
            "/:id",
            get(inspections::get_inspection)
                .patch(inspections::update_inspection)
                .delete(inspections::delete_inspection),
        )
        .route("/:id/pass", post(inspections::action_pass))
        .route("/:id/fail", post(inspections::action_fail))
        .route("/:id/reset", post(inspections::action_reset_draft))
        .route("/:id/lines/:line_id", patch(inspections::update_line))
        .route(
            "/:id/lines/:line_id/images",
            get(inspections::list_line_images).post(inspections::upload_line_image),
        )
        .route(
            "/:id/lines/:line_id/images/:image_id",
            delete(inspections::delete_line_image),
        )
        .route("/:id/attachments", get(inspections::list_attachments))
        .route(
            "/:id/attachments/:attachment_id/download",
            get(inspections::download_attachment),
        );

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/:id", get(documents::get_document).delete(documents::delete_document));

    let invoices_routes = Router::new()
        .route("/", post(documents::create_invoice))
        .route("/:id", patch(documents::update_invoice));

    let dashboard_routes = Router::new()
        .route("/inspections", get(dashboard::inspection_stats))
        .route("/machines", get(dashboard::machine_stats))
        .route("/customers", get(dashboard::customer_stats));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/customers", customers_routes)
        .nest("/api/categories", categories_routes)
        .nest("/api/machines", machines_routes)
        .nest("/api/inspections", inspections_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/invoices", invoices_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/my", portal_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(certificate_routes)
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 64))
}
