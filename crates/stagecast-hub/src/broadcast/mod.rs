//! Channel subscriptions and fan-out

mod dispatcher;

pub use dispatcher::BroadcastDispatcher;
