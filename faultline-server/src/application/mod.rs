pub(crate) mod failure;
pub(crate) mod guard;
pub(crate) mod normalizer;
pub(crate) mod reporting;
