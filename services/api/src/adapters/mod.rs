pub mod db;
pub mod fs_store;

pub use db::DbAdapter;
pub use fs_store::LocalObjectStore;
