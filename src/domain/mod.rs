// Domain layer: core models and ports (interfaces) shared by core services and adapters.

pub mod model;
pub mod ports;
