use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, frontend_url, "invalid FRONTEND_URL, cross-origin requests disabled");
            cors
        }
    }
}

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
];

fn with_security_headers(router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/bookings/availability",
            post(handlers::availability::create_availability),
        )
        .route(
            "/bookings/availability/:tutor_id",
            get(handlers::availability::get_availability)
                .post(handlers::availability::create_availability_for_tutor),
        )
        .route(
            "/bookings/availability/slot/:id",
            delete(handlers::availability::delete_availability),
        )
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/events", get(handlers::bookings::events_stream))
        .route(
            "/bookings/student/:id",
            get(handlers::bookings::list_student_bookings),
        )
        .route(
            "/bookings/tutor/:id",
            get(handlers::bookings::list_tutor_bookings),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/bookings/:id/confirm",
            put(handlers::bookings::confirm_booking),
        )
        .route("/bookings/:id/cancel", put(handlers::bookings::cancel_booking))
        .route(
            "/bookings/:id/reschedule",
            put(handlers::bookings::reschedule_booking),
        )
        .route("/booking-offers", post(handlers::offers::create_offer))
        .route("/booking-offers/:id", get(handlers::offers::list_offers))
        .route(
            "/booking-offers/:id/cancel",
            post(handlers::offers::cancel_offer),
        )
        .route(
            "/booking-proposals",
            post(handlers::offers::create_proposal),
        )
        .route(
            "/booking-confirmations",
            post(handlers::offers::create_confirmation),
        )
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    with_security_headers(routes.layer(cors_layer(&state.config.frontend_url)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
