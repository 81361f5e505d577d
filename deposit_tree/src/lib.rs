pub use crate::deposit_tree::{DepositTree, Error};

mod deposit_tree;
