pub mod intrusive_list;

pub use intrusive_list::{IntrusiveList, Link, LinkStore, LinkStoreMut, NodeId};
