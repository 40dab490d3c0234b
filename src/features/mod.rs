pub mod assembler;
pub mod skills;
pub mod temporal;
pub mod vector;
