mod cluster;
mod controls;
mod engine;
mod manifest;
mod resources;
mod stage;
mod stepper;
#[cfg(test)]
pub mod testing;

pub use cluster::{ClusterReader, KubeCluster};
pub use engine::{Engine, ObjectKey};
pub use stage::Stage;
