pub mod configuration;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod pool;
pub mod provider;
pub mod providers;
pub mod proxy;
pub mod store;
pub mod user_agent;
pub mod verification;

pub use fetch::Fetcher;
pub use pool::ProxyPool;
pub use proxy::Proxy;
