mod notifier;
mod types;

pub use notifier::{RequestNotifier, ResponseNotifier};
pub use types::{
    ExchangeResult, Request, RequestListener, RequestPair, ResponseContext, ResponseListener,
};
