/// Signed REST protocol layer used by every connector.
pub mod http;
