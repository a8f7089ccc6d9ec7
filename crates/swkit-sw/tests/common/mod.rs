pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{next_entry_cached, origin, shell_html, test_config, worker_with};
#[allow(unused_imports)]
pub use mocks::{InstrumentedStorage, MockFetcher};
