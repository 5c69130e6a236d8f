pub mod filter;
pub mod headless;
pub mod popup;
pub mod registry;
pub mod router;
pub mod scene;
pub mod surface;
pub mod symbology;

pub use filter::*;
pub use headless::*;
pub use popup::*;
pub use registry::*;
pub use router::*;
pub use scene::*;
pub use surface::*;
pub use symbology::*;
