pub mod estimate;
pub mod feed;
pub mod observer;
