pub mod hashable;
pub mod job;
pub mod molecule;
pub mod response;
pub mod tools;
