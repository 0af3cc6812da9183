//! A bounded, lock-free multi-producer single-consumer event ring buffer.
//!
//! Multiple producer threads reserve a slot, write into it, then commit;
//! a single consumer thread pops committed slots in FIFO order. Slot
//! sequence numbers are assigned with a compare-and-swap loop rather than a
//! bare `fetch_add`, so a producer that loses the race never advances the
//! write cursor past the ring's true capacity.
//!
//! # Example
//!
//! ```
//! use eventring::{Event, EventProcessor};
//!
//! struct Greet(&'static str);
//!
//! impl Event for Greet {
//!     fn process(&mut self) {
//!         println!("hello, {}", self.0);
//!     }
//! }
//!
//! let processor: EventProcessor<16> = EventProcessor::new();
//! processor.reserve(Greet("world")).unwrap().commit();
//!
//! if let Some(mut event) = processor.pop_event() {
//!     event.process();
//! }
//! ```

mod backoff;
mod config;
mod error;
mod event;
mod invariants;
mod metrics;
mod processor;
mod reservation;
mod ring;

pub use backoff::Backoff;
pub use config::{RingConfig, LOW_LATENCY_CONFIG, OBSERVABLE_CONFIG};
pub use error::ContractViolation;
pub use event::Event;
pub use metrics::{Metrics, MetricsSnapshot};
pub use processor::{EventProcessor, ReservedEvent, ReservedEvents};
pub use reservation::{RangeReservation, Reservation};
pub use ring::RingBuffer;
