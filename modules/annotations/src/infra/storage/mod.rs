pub mod docstore_repo;
pub mod documents;

pub use docstore_repo::DocStoreRepository;
