pub mod channel_headers;

pub use channel_headers::ChannelHeaders;
