pub mod http_completion_client;
pub mod http_entity_search;
pub mod paths;
pub mod toml_session_repository;

pub use crate::http_completion_client::HttpCompletionClient;
pub use crate::http_entity_search::HttpEntitySearch;
pub use crate::paths::DeskchatPaths;
pub use crate::toml_session_repository::TomlSessionRepository;
