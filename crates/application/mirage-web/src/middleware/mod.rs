pub mod html_ext;
pub mod rate_limit;
