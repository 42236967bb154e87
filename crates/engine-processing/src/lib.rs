pub mod checkpoint;
pub mod error;
pub mod feed;
pub mod keeper;
pub mod renewer;
pub mod retry;

#[cfg(test)]
mod test_support;
