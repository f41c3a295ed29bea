pub mod config;
pub mod endpoint;
pub mod providers;
pub mod selection;

pub use config::{InferenceConfig, Protocol};
pub use endpoint::Endpoint;
pub use providers::mock::{MockProvider, StaticProviderFactory};
pub use providers::{HttpProviderFactory, ProviderFactory};
pub use selection::{select_model, strip_version_suffix};
