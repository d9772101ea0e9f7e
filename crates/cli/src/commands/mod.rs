pub mod cache_list;
pub mod check;
pub mod listen;
pub mod publish;
