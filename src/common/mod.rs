pub mod format;
pub mod paths;
pub mod response;
pub mod upload;
