pub mod arrendamientos_envigado;
pub mod browser;
pub mod coordinator;
pub mod helpers;
pub mod livinmobiliaria;
pub mod orchestrator;
pub mod registry;
pub mod traits;
pub mod types;

pub use arrendamientos_envigado::ArrendamientosEnvigado;
pub use browser::{ChromeLauncher, Page, RenderSession, SessionLauncher};
pub use livinmobiliaria::Livinmobiliaria;
pub use registry::{AdapterRegistry, SourceSelection};
pub use traits::SiteAdapter;
pub use types::{PriceRange, ScrapeConfig, ScrapeOverrides, SearchInput};
