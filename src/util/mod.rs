pub(crate) mod hint;
