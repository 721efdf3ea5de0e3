// Native implementations

pub mod http;
pub mod quote_impl;
pub mod rpc_impl;
pub mod storage_impl;

pub use http::NativeHttpClient;
pub use quote_impl::JupiterQuoteClient;
pub use rpc_impl::NativeRpcClient;
pub use storage_impl::FileStorage;
