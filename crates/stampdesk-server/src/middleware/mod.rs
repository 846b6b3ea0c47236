pub(crate) mod security_headers;
