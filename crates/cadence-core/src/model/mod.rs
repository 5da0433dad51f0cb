mod completion;
mod habit;

pub use completion::*;
pub use habit::*;

#[cfg(test)]
mod tests;
