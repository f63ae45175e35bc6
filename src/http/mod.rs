pub mod client;
pub mod transport;

pub use client::{HttpClient, HttpMethod, HttpResponse, ReqwestHttpClient};
pub use transport::Transport;
