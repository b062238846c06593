//! WeChat mini-program API client: login code exchange, subscription
//! messages, scheme / url-link generation, behind a locally cached
//! bearer token.

pub mod client;
pub mod token_cache;

pub use client::{
    MiniProgramClient, SchemeJump, SessionInfo, SubscribeMessage, UrlLinkRequest, WxError,
    BASE_ATTEMPTS,
};
pub use token_cache::{CachedToken, TokenCache};
