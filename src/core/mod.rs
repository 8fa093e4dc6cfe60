//! Dispatch core: the coordinator contract and its strategies.
//!
//! The public API of this module is the [`Dispatcher`] trait, the three
//! strategies implementing it, and [`Config`] for the worker-backed ones.
//!
//! Internal modules:
//! - [`dispatcher`]: contract, [`Delivery`], and the steps shared by all strategies;
//! - [`inline`]: sequential delivery on the caller's thread;
//! - [`worker`]: sequential delivery on one background worker;
//! - [`fanout`]: parallel delivery, one blocking task per listener;
//! - [`shutdown`]: bounded waits used by `close()`;
//! - [`config`]: dispatcher settings.
//!
//! ## Strategies
//! | Strategy             | Thread(s)              | Order           | `handled` stops | Abort reaches caller |
//! |----------------------|------------------------|-----------------|-----------------|----------------------|
//! | [`InlineDispatcher`] | caller                 | snapshot        | yes             | yes                  |
//! | [`WorkerDispatcher`] | one worker             | snapshot, FIFO  | yes             | no (logged)          |
//! | [`FanOutDispatcher`] | one task per listener  | none            | no              | no (logged)          |

mod config;
mod dispatcher;
mod fanout;
mod inline;
mod shutdown;
mod worker;

pub use config::Config;
pub use dispatcher::{Delivery, DispatchOutcome, Dispatcher, delivery};
pub use fanout::FanOutDispatcher;
pub use inline::InlineDispatcher;
pub use worker::WorkerDispatcher;
