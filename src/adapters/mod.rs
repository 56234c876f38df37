pub mod docker;
pub mod singularity;

pub use docker::DockerBackend;
pub use singularity::SingularityBackend;
