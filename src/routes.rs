use crate::{
    api::{attendance, device, geofence},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-scope limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let attendance_limiter = Arc::new(build_limiter(config.rate_attendance_per_min));

    // All routes require a bearer access token
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .wrap(attendance_limiter)
                    // /attendance/today
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    // /attendance/overview
                    .service(
                        web::resource("/overview").route(web::get().to(attendance::overview)),
                    )
                    // /attendance/check-in
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    // /attendance/check-out
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    ),
            )
            .service(
                web::scope("/device")
                    // /device/status
                    .service(web::resource("/status").route(web::get().to(device::device_status)))
                    // /device/register
                    .service(
                        web::resource("/register").route(web::post().to(device::register_device)),
                    )
                    // /device/registrations/pending
                    .service(
                        web::resource("/registrations/pending")
                            .route(web::get().to(device::pending_registrations)),
                    )
                    // /device/registrations/{id}/approve
                    .service(
                        web::resource("/registrations/{id}/approve")
                            .route(web::post().to(device::approve_device)),
                    )
                    // /device/registrations/{id}/reject
                    .service(
                        web::resource("/registrations/{id}/reject")
                            .route(web::post().to(device::reject_device)),
                    ),
            )
            .service(
                web::scope("/geofence")
                    // /geofence
                    .service(
                        web::resource("")
                            .route(web::get().to(geofence::get_geofence))
                            .route(web::put().to(geofence::update_geofence)),
                    )
                    // /geofence/status
                    .service(
                        web::resource("/status").route(web::get().to(geofence::geofence_status)),
                    ),
            ),
    );
}
