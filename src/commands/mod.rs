pub mod compare;
mod corpus;
pub mod evaluate;
pub mod extract;
