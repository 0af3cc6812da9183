//! Multiple writer threads feeding one reader through an `EventProcessor`.
//!
//! Run with: cargo run --release --example multi_writer

use eventring::{Event, EventProcessor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

struct Tick(usize);

impl Event for Tick {
    fn process(&mut self) {
        std::hint::black_box(self.0);
    }
}

fn main() {
    const WRITERS: usize = 8;
    const EVENTS_PER_WRITER: usize = 200_000;

    let processor: Arc<EventProcessor<65536>> = Arc::new(EventProcessor::new());
    let processed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let reader = {
        let processor = Arc::clone(&processor);
        let processed = Arc::clone(&processed);
        thread::spawn(move || {
            while !processor.is_drained() {
                if let Some(mut event) = processor.pop_event_with_backoff() {
                    event.process();
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|id| {
            let processor = Arc::clone(&processor);
            thread::spawn(move || {
                for i in 0..EVENTS_PER_WRITER {
                    loop {
                        if let Some(reserved) = processor.reserve(Tick(id * EVENTS_PER_WRITER + i)) {
                            reserved.commit();
                            break;
                        }
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    processor.shutdown();
    reader.join().unwrap();

    let elapsed = start.elapsed();
    let total = WRITERS * EVENTS_PER_WRITER;
    println!("processed {} events in {:?}", total, elapsed);
    println!("metrics: {:?}", processor.metrics());
    assert_eq!(processed.load(Ordering::Relaxed), total);
}
