pub mod client;
pub mod kubeconfig;
pub mod manager;
pub mod watcher;

pub use client::VeleroClient;
pub use manager::ClusterManager;
