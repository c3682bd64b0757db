//! Rejected status transitions

/// A direct status edit that would break the parent/child completion rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropagationError {
    /// `Concluído` requested while some children are still open
    #[error("cannot mark as Concluído: {pending} of {total} children are not Concluído")]
    ChildrenIncomplete {
        /// Children not yet done
        pending: usize,
        /// All children
        total: usize,
    },

    /// Non-final status requested while every child is done
    #[error("all {total} children are Concluído; reopen a child instead of the parent")]
    ChildrenComplete {
        /// All children
        total: usize,
    },
}
