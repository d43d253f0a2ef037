pub mod interceptor;
pub mod observer;

pub use interceptor::{HandlerInterceptor, Invocation, Next};
pub use observer::SendObserver;
