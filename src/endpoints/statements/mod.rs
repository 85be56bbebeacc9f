pub mod latest;
pub use latest::latest;

pub mod upload;
pub use upload::upload;

#[cfg(test)]
mod tests;
