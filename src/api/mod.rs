pub mod auth;
mod catalog;
mod client_projects;
pub mod collections;
pub mod error;
mod events;
mod projects;
mod staff;
mod tickets;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::models::{
    ClientProject, PortfolioProject, PricingPackage, Project, Service, StaffMember, Ticket,
};
use crate::AppState;

/// Item routes shared by every collection: get, update, delete, live events
fn item_routes<T: collections::Present>(
    router: Router<Arc<AppState>>,
    base: &str,
) -> Router<Arc<AppState>> {
    router
        .route(&format!("{base}/events"), get(events::stream::<T>))
        .route(
            &format!("{base}/:id"),
            get(collections::get_one::<T>)
                .put(collections::update::<T>)
                .delete(collections::remove::<T>),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Staff
        .route(
            "/staff",
            get(staff::list_staff).post(collections::create::<StaffMember>),
        )
        .route("/staff/:id/promote", post(staff::promote_staff))
        .route("/staff/:id/demote", post(staff::demote_staff))
        .route("/staff/:id/fire", post(staff::fire_staff))
        // Tickets
        .route(
            "/tickets",
            get(tickets::list_tickets).post(collections::create::<Ticket>),
        )
        .route("/tickets/:id/status", put(tickets::set_ticket_status))
        // Internal projects
        .route(
            "/projects",
            get(projects::list_projects).post(collections::create::<Project>),
        )
        .route("/projects/:id/milestones", post(projects::add_milestone))
        .route(
            "/projects/:id/milestones/:milestone_id",
            put(projects::update_milestone).delete(projects::delete_milestone),
        )
        // Client projects
        .route(
            "/client-projects",
            get(collections::list::<ClientProject>).post(collections::create::<ClientProject>),
        )
        .route("/client-projects/:id/phases", post(client_projects::add_phase))
        .route(
            "/client-projects/:id/phases/:phase_id",
            put(client_projects::update_phase).delete(client_projects::delete_phase),
        )
        .route(
            "/client-projects/:id/phases/:phase_id/tasks",
            post(client_projects::add_task),
        )
        .route(
            "/client-projects/:id/phases/:phase_id/tasks/:task_id",
            put(client_projects::update_task).delete(client_projects::delete_task),
        )
        .route(
            "/client-projects/:id/phases/:phase_id/tasks/:task_id/toggle",
            post(client_projects::toggle_task),
        )
        .route("/client-projects/:id/members", post(client_projects::add_member))
        .route(
            "/client-projects/:id/members/:member_id",
            delete(client_projects::remove_member),
        )
        // Website content
        .route(
            "/services",
            get(catalog::list_catalog::<Service>).post(collections::create::<Service>),
        )
        .route("/services/:id/reorder", post(catalog::reorder::<Service>))
        .route("/services/:id/toggle", post(catalog::toggle::<Service>))
        .route(
            "/packages",
            get(catalog::list_catalog::<PricingPackage>).post(collections::create::<PricingPackage>),
        )
        .route("/packages/:id/reorder", post(catalog::reorder::<PricingPackage>))
        .route("/packages/:id/toggle", post(catalog::toggle::<PricingPackage>))
        .route(
            "/portfolio",
            get(catalog::list_catalog::<PortfolioProject>)
                .post(collections::create::<PortfolioProject>),
        )
        .route("/portfolio/:id/reorder", post(catalog::reorder::<PortfolioProject>))
        .route("/portfolio/:id/toggle", post(catalog::toggle::<PortfolioProject>));

    api_routes = item_routes::<StaffMember>(api_routes, "/staff");
    api_routes = item_routes::<Ticket>(api_routes, "/tickets");
    api_routes = item_routes::<Project>(api_routes, "/projects");
    api_routes = item_routes::<ClientProject>(api_routes, "/client-projects");
    api_routes = item_routes::<Service>(api_routes, "/services");
    api_routes = item_routes::<PricingPackage>(api_routes, "/packages");
    api_routes = item_routes::<PortfolioProject>(api_routes, "/portfolio");

    // Everything under /api requires an admin
    let api_routes = api_routes.layer(middleware::from_fn_with_state(
        state.clone(),
        auth::auth_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
