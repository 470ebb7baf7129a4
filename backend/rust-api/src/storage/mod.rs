pub mod hint_store;

pub use hint_store::HintStore;
