pub mod hashing;
pub mod subgraph;
pub mod topology;
