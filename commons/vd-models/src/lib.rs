pub mod cluster;
pub mod events;
pub mod notification;
pub mod velero;

pub use cluster::*;
pub use events::*;
pub use notification::*;
pub use velero::*;
