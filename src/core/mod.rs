pub mod analysis;
pub mod corpus;
pub mod dataset;
pub mod materialize;
pub mod operations;
