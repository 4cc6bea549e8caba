pub mod batch;
pub mod fetch;
pub mod height;
pub mod info;
pub mod transform;
