use shared::domain::ItemId;
use thiserror::Error;

/// Contract violations raised by the reducer. These mean the view issued a
/// command that cannot apply to the model it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error(
        "reorder target index {to_index} out of range (collection has {collection_len} items, group has {group_len})"
    )]
    ReorderOutOfRange {
        to_index: usize,
        collection_len: usize,
        group_len: usize,
    },
}
