// Business domains
pub mod articles;
