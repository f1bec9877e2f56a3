/// OpenAPI documentation generation.
pub mod documentation;
/// Guild record, entity and player operations backing the REST routes.
pub mod guild_service;
/// Health check service.
pub mod health_service;
