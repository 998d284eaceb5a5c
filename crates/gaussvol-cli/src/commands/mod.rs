pub mod evaluate;
pub mod tree;
