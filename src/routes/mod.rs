pub mod admin;
pub mod articles;
pub mod auth;
pub mod editor;
pub mod functions;
pub mod publish;
pub mod submissions;

pub use admin::admin_routes;
pub use articles::{articles_routes, doi_routes};
pub use auth::auth_routes;
pub use editor::editor_routes;
pub use functions::functions_routes;
pub use submissions::submissions_routes;
