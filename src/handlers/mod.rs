pub mod fixity_handlers;
pub mod health_handlers;
