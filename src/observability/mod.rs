pub mod logging;

pub use logging::{init_logging, mask_email, mask_phone, mask_sensitive, LogConfig, LogFormat};
