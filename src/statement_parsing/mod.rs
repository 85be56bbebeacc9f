mod columns;
pub use columns::*;

mod normalize;
pub use normalize::*;
