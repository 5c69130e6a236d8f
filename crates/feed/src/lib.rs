pub mod api;
pub mod collection;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod location;
pub mod model;
pub mod protocol;

pub use api::*;
pub use collection::*;
pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use http::*;
pub use location::*;
pub use model::*;
pub use protocol::*;
