use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uniflow::core::{AccessMode, ExecutionMode};
use uniflow::pipe::Pipe;
use uniflow::runtime::{Buffer, Queue};

/// A producer stage streams through a pipe to a consumer stage. The two
/// command groups run concurrently — the pipe is smaller than the
/// transfer, so neither could finish without the other making progress.
#[test]
fn staged_dataflow_through_a_pipe() {
    let queue = Queue::with_mode(ExecutionMode::Asynchronous);
    let staging = Buffer::<u32>::new((0..16).collect());
    let results = Buffer::<u32>::with_len(16);
    let pipe = Arc::new(Pipe::new(4));

    // Producer: reads the staging buffer, pushes doubled values.
    let payload = staging.payload();
    let tx_pipe = pipe.clone();
    queue.submit(|cgh| {
        cgh.require(&staging, AccessMode::Read);
        tx_pipe.bind_to(cgh, AccessMode::Write).unwrap();
        cgh.single_task(move || {
            let data = payload.lock();
            for &v in data.iter() {
                tx_pipe.write(v * 2);
            }
        });
    });

    // Consumer: drains the pipe into the result buffer.
    let payload = results.payload();
    let rx_pipe = pipe.clone();
    queue.submit(|cgh| {
        cgh.require(&results, AccessMode::Write);
        rx_pipe.bind_to(cgh, AccessMode::Read).unwrap();
        cgh.single_task(move || {
            let mut out = payload.lock();
            for slot in out.iter_mut() {
                *slot = rx_pipe.read();
            }
        });
    });

    queue.drain();
    let view = results.host_view();
    assert_eq!(*view, (0..16).map(|v| v * 2).collect::<Vec<_>>());
}

/// Bulk transfer: the producer fills each reservation back to front; the
/// consumer still observes submission order.
#[test]
fn bulk_transfer_with_reserved_slots() {
    let queue = Queue::with_mode(ExecutionMode::Asynchronous);
    let pipe = Arc::new(Pipe::new(16));

    let tx_pipe = pipe.clone();
    queue.submit(|cgh| {
        tx_pipe.bind_to(cgh, AccessMode::Write).unwrap();
        cgh.single_task(move || {
            for chunk in 0..4u32 {
                let r = tx_pipe.reserve_write(8).expect("non-empty request");
                // Fill back to front; fill order must not matter.
                for i in (0..8).rev() {
                    r.set(i, chunk * 8 + i as u32);
                }
            }
        });
    });

    let rx_pipe = pipe.clone();
    let collected = Arc::new(shared::Cell::default());
    let sink = collected.clone();
    queue.submit(|cgh| {
        rx_pipe.bind_to(cgh, AccessMode::Read).unwrap();
        cgh.single_task(move || {
            let mut values = Vec::with_capacity(32);
            for _ in 0..4 {
                let mut r = rx_pipe.reserve_read(8).expect("non-empty request");
                values.extend(r.to_vec());
                r.commit();
            }
            sink.set(values);
        });
    });

    queue.drain();
    assert_eq!(collected.take(), (0..32).collect::<Vec<u32>>());
    assert!(pipe.is_empty());
}

/// Prologue and epilogue hooks fire around the body, in order, on the
/// execution thread.
#[test]
fn hooks_bracket_the_body_across_threads() {
    let queue = Queue::with_mode(ExecutionMode::Asynchronous);
    let log = Arc::new(shared::Cell::default());

    let task = queue.submit(|cgh| {
        let l = log.clone();
        cgh.task().add_prologue(move || l.push("prologue"));
        let l = log.clone();
        cgh.task().add_epilogue(move || l.push("epilogue"));
        let l = log.clone();
        cgh.single_task(move || {
            thread::sleep(Duration::from_millis(10));
            l.push("body");
        });
    });

    task.wait();
    assert_eq!(log.take(), vec!["prologue", "body", "epilogue"]);
}

/// Minimal shared cell so test bodies can report results without
/// pulling extra dev-dependencies into the root crate.
mod shared {
    use std::sync::Mutex;

    pub struct Cell<T>(Mutex<Vec<T>>);

    impl<T> Default for Cell<T> {
        fn default() -> Self {
            Self(Mutex::new(Vec::new()))
        }
    }

    impl<T> Cell<T> {
        pub fn push(&self, value: T) {
            self.0.lock().unwrap().push(value);
        }

        pub fn set(&self, values: Vec<T>) {
            *self.0.lock().unwrap() = values;
        }

        pub fn take(&self) -> Vec<T> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }
}
