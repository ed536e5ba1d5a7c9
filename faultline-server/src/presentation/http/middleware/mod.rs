pub(crate) mod auth;
pub(crate) mod guard;
pub(crate) mod layers;
