//! Server construction and route wiring.

pub mod config;

pub use config::{AppConfig, ConfigError, Secret};

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::{info, warn};

#[cfg(debug_assertions)]
use utoipa::OpenApi as _;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::ApiDoc;
use crate::inbound::http::admin::{
    approve_localization, create_key, create_language, create_localization, delete_key,
    delete_language, delete_localization, invalidate_cache, list_audit, list_keys, update_key,
    update_language, update_localization,
};
use crate::inbound::http::catalog::get_catalog;
use crate::inbound::http::health::health;
use crate::inbound::http::languages::list_languages;
use crate::inbound::http::localize::{localize_batch, localize_key};
use crate::inbound::http::state::HttpState;
use config::ServiceSection;

/// Assemble the application with every route mounted.
pub fn build_app(
    state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let admin = web::scope("/admin")
        .service(create_language)
        .service(update_language)
        .service(delete_language)
        .service(create_key)
        .service(list_keys)
        .service(update_key)
        .service(delete_key)
        .service(create_localization)
        .service(update_localization)
        .service(delete_localization)
        .service(approve_localization)
        .service(invalidate_cache)
        .service(list_audit);

    let api = web::scope("/v1")
        .service(list_languages)
        .service(get_catalog)
        .service(localize_key)
        .service(localize_batch)
        .service(admin);

    let app = App::new().app_data(state).service(health).service(api);

    #[cfg(debug_assertions)]
    let app = app.service(
        SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app
}

/// Bind and start the HTTP server.
///
/// The preferred port is tried first, then each port of the configured
/// range in order; startup fails when none is free. Returns the running
/// server and the port it bound.
pub fn create_server(
    state: HttpState,
    service: &ServiceSection,
) -> std::io::Result<(Server, u16)> {
    let host = service.host.clone();
    let mut bound = None;
    for port in service.candidate_ports() {
        match std::net::TcpListener::bind((host.as_str(), port)) {
            Ok(listener) => {
                bound = Some((listener, port));
                break;
            }
            Err(err) => {
                warn!(%host, port, error = %err, "bind failed; trying next candidate port");
            }
        }
    }

    let (listener, port) = bound.ok_or_else(|| {
        std::io::Error::other("no free port among the preferred port and configured range")
    })?;
    listener.set_nonblocking(true)?;

    let data = web::Data::new(state);
    let server = HttpServer::new(move || build_app(data.clone()))
        .listen(listener)?
        .run();
    info!(%host, port, "listener bound");
    Ok((server, port))
}

#[cfg(test)]
mod tests {
    //! Port selection behaviour.
    use super::{config::ServiceSection, create_server};
    use crate::domain::ports::{CacheTier, CatalogStore, FixtureTokenVerifier, TokenVerifier};
    use crate::domain::{AdminService, CacheTtls, CatalogService, TieredCache};
    use crate::inbound::http::state::{HttpState, Timeouts};
    use crate::outbound::cache::{MemoryCache, MemoryCacheConfig};
    use crate::test_support::InMemoryCatalogStore;
    use std::sync::Arc;

    fn test_state() -> HttpState {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalogStore::new());
        let cache = Arc::new(TieredCache::new(
            Arc::new(MemoryCache::new(MemoryCacheConfig {
                capacity_bytes: 1024 * 1024,
                shards: 2,
            })) as Arc<dyn CacheTier>,
            None,
            CacheTtls::default(),
        ));
        HttpState::new(
            Arc::new(CatalogService::new(Arc::clone(&store), Arc::clone(&cache))),
            Arc::new(AdminService::new(store, cache)),
            Arc::new(FixtureTokenVerifier::new("tests", Vec::new())) as Arc<dyn TokenVerifier>,
            ["admin".to_owned()].into_iter().collect(),
            Timeouts::default(),
        )
    }

    #[actix_rt::test]
    async fn falls_back_to_the_next_free_port() {
        let occupied =
            std::net::TcpListener::bind(("127.0.0.1", 0)).expect("ephemeral listener");
        let taken = occupied.local_addr().expect("local addr").port();
        let probe = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("probe listener");
        let free = probe.local_addr().expect("local addr").port();
        drop(probe);

        let service = ServiceSection {
            host: "127.0.0.1".to_owned(),
            port: taken,
            port_range: Some((free, free)),
            ..ServiceSection::default()
        };
        let (server, port) = create_server(test_state(), &service).expect("server binds");
        assert_eq!(port, free, "preferred port was taken");
        drop(server);
    }

    #[actix_rt::test]
    async fn fails_when_no_candidate_port_is_free() {
        let occupied =
            std::net::TcpListener::bind(("127.0.0.1", 0)).expect("ephemeral listener");
        let taken = occupied.local_addr().expect("local addr").port();

        let service = ServiceSection {
            host: "127.0.0.1".to_owned(),
            port: taken,
            port_range: None,
            ..ServiceSection::default()
        };
        let err = match create_server(test_state(), &service) {
            Err(err) => err,
            Ok(_) => panic!("bind fails"),
        };
        assert!(err.to_string().contains("no free port"));
    }
}
