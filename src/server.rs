//! Router assembly and server startup.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::manager::DatabaseManager;
use crate::handlers;

pub fn app() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(lab_routes())
        .merge(research_group_routes())
        .merge(member_routes())
        .merge(paper_routes())
        .merge(news_routes())
        .merge(project_routes())
        .merge(resource_routes())
        .merge(admin_routes())
        .merge(edit_record_routes())
        .merge(media_routes())
        .merge(image_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes() -> Router {
    use handlers::admin;

    Router::new()
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/change-password", post(admin::change_password))
        .route("/api/admin/profile", get(admin::profile))
}

fn lab_routes() -> Router {
    use handlers::lab;

    Router::new().route(
        "/api/lab",
        get(lab::get_lab).put(lab::update_lab).delete(lab::delete_lab),
    )
}

fn research_group_routes() -> Router {
    use handlers::research_group as groups;

    Router::new()
        .route(
            "/api/research-groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/api/research-groups/:id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
}

fn member_routes() -> Router {
    use handlers::member;

    Router::new()
        .route(
            "/api/members",
            get(member::list_members).post(member::create_member),
        )
        .route(
            "/api/members/batch",
            put(member::batch_update_members).delete(member::batch_delete_members),
        )
        .route(
            "/api/members/:id",
            get(member::get_member)
                .put(member::update_member)
                .delete(member::delete_member),
        )
}

fn paper_routes() -> Router {
    use handlers::paper;

    Router::new()
        .route("/api/papers", get(paper::list_papers).post(paper::create_paper))
        .route(
            "/api/papers/:id",
            get(paper::get_paper)
                .put(paper::update_paper)
                .delete(paper::delete_paper),
        )
}

fn news_routes() -> Router {
    use handlers::news;

    Router::new()
        .route("/api/news", get(news::list_news).post(news::create_news))
        .route(
            "/api/news/:id",
            get(news::get_news).put(news::update_news).delete(news::delete_news),
        )
}

fn project_routes() -> Router {
    use handlers::project;

    Router::new()
        .route(
            "/api/projects",
            get(project::list_projects).post(project::create_project),
        )
        .route(
            "/api/projects/:id",
            get(project::get_project)
                .put(project::update_project)
                .delete(project::delete_project),
        )
}

fn resource_routes() -> Router {
    use handlers::resource;

    Router::new()
        .route(
            "/api/resources",
            get(resource::list_resources).post(resource::create_resource),
        )
        .route(
            "/api/resources/:id",
            get(resource::get_resource)
                .put(resource::update_resource)
                .delete(resource::delete_resource),
        )
}

fn admin_routes() -> Router {
    use handlers::admin;

    Router::new()
        .route("/api/admins", get(admin::list_admins).post(admin::create_admin))
        .route(
            "/api/admins/:id",
            put(admin::update_admin).delete(admin::delete_admin),
        )
}

fn edit_record_routes() -> Router {
    use handlers::edit_record;

    Router::new()
        .route("/api/edit-records", get(edit_record::list_records))
        .route("/api/edit-records/:id", get(edit_record::get_record))
}

fn media_routes() -> Router {
    use handlers::media;

    Router::new()
        .route("/api/media/upload", post(media::upload))
        .route("/api/media/serve/*path", get(media::serve))
        .route("/api/media/info", get(media::info))
        .route("/api/media/health", get(media::health))
}

fn image_routes() -> Router {
    use handlers::image_upload as images;

    Router::new()
        .route("/api/images/upload", post(images::upload))
        .route("/api/images/mark-used", post(images::mark_used))
        .route("/api/images/cleanup", post(images::cleanup))
        .route(
            "/api/images/entity/:entity_type/:entity_id",
            get(images::entity_images),
        )
        .route("/api/images/:id", delete(images::delete_image))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "code": 0,
        "message": "OK",
        "data": {
            "name": "Labsite API",
            "version": version,
            "description": "Administrative backend for a laboratory's public website",
            "endpoints": {
                "auth": "/api/admin/login, /api/admin/logout, /api/admin/change-password",
                "lab": "/api/lab",
                "research_groups": "/api/research-groups[/:id]",
                "members": "/api/members[/:id], /api/members/batch",
                "papers": "/api/papers[/:id]",
                "news": "/api/news[/:id]",
                "projects": "/api/projects[/:id]",
                "resources": "/api/resources[/:id]",
                "admins": "/api/admins[/:id] (super admin)",
                "audit": "/api/edit-records[/:id]",
                "media": "/api/media/upload, /api/media/serve/*path",
                "images": "/api/images/upload, /api/images/cleanup",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "code": 0,
                "message": "OK",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "code": 5000,
                "message": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

/// Bind and serve until shutdown.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("labsite-api listening on http://{}", bind_addr);

    axum::serve(listener, app()).await?;
    Ok(())
}

/// Port resolution: LABSITE_API_PORT, then PORT, then 3000.
pub fn port_from_env() -> u16 {
    std::env::var("LABSITE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000)
}
