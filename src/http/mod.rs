mod client;

#[cfg(test)]
pub mod testing;

pub use client::{
    FormParams, HttpResponse, ReqwestTransport, ResilientClient, RetryPolicy, Sleeper,
    ThreadSleeper,
};
