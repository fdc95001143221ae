mod lowering;
mod tree;
