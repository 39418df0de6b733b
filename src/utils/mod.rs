pub mod base64;
pub mod system;
pub mod url;

pub use base64::{base64_encode, url_safe_base64_encode};
pub use system::unix_now;
pub use url::url_encode;
