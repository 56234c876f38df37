// Domain layer: models, the backend port (interface) and the service topology.

pub mod model;
pub mod ports;
pub mod services;
