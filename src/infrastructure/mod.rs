pub mod chain;
pub mod db;
pub mod hashing;
pub mod media;
pub mod storage;
