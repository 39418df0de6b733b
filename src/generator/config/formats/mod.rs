pub mod clash;
pub mod singbox;
pub mod single;
pub mod v2ray;

// Re-export all format renderers
pub use clash::{proxy_to_clash_yaml, proxy_to_mihomo_yaml, proxy_to_stash_yaml};
pub use singbox::{proxy_to_singbox, proxy_to_singbox_legacy};
pub use single::proxy_to_single;
pub use v2ray::proxy_to_v2ray_json;
