pub mod protocol;
pub mod schemas;
pub mod version;
