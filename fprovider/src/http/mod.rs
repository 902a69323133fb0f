//! OpenAI-compatible HTTP backend adapter used for both the routed and direct bindings.
//!
//! ```rust,no_run
//! use fprovider::SecretString;
//! use fprovider::http::OpenAiCompatibleProvider;
//!
//! let routed =
//!     OpenAiCompatibleProvider::open_router(SecretString::new("sk-or-..."), Some("demo"));
//! let direct = OpenAiCompatibleProvider::open_ai(SecretString::new("sk-..."));
//! # let _ = (routed, direct);
//! ```

mod provider;
mod transport;
mod wire;


pub use provider::OpenAiCompatibleProvider;
pub use transport::{
    CompletionTransport, HttpTransport, OPEN_AI_BASE_URL, OPEN_ROUTER_BASE_URL, PayloadStream,
};
pub use wire::classify_status;
