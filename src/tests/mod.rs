pub(crate) mod mock;
mod template;
