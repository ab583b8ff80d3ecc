use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use uniflow_pipe::Pipe;

#[test]
fn blocking_producer_consumer_round_trip() {
    let pipe = Pipe::new(4);

    thread::scope(|s| {
        s.spawn(|| {
            // Twice the capacity, so the producer must block and resume.
            for v in 0..8u32 {
                pipe.write(v);
            }
        });

        let received: Vec<u32> = (0..8).map(|_| pipe.read()).collect();
        assert_eq!(received, (0..8).collect::<Vec<_>>());
    });

    assert!(pipe.is_empty());
}

#[test]
fn out_of_order_commits_become_visible_in_reservation_order() {
    let pipe = Pipe::new(16);

    thread::scope(|s| {
        // Claim in order on this thread so the reservation order is
        // deterministic, then hand the handles to workers that fill and
        // commit them in reverse.
        let first = pipe.try_reserve_write(4).expect("room for 4");
        let second = pipe.try_reserve_write(4).expect("room for 4 more");

        let (started_tx, started_rx) = mpsc::channel();

        let handle = s.spawn(move || {
            for i in 0..4 {
                second.set(i, 100 + i as u32);
            }
            started_tx.send(()).unwrap();
            // Handle drops here: commit of the later reservation.
        });

        started_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("worker never filled its claim");
        handle.join().unwrap();

        // The later claim has committed, the earlier has not.
        assert_eq!(pipe.size(), 0);

        for i in 0..4 {
            first.set(i, i as u32);
        }
        drop(first);
    });

    let drained: Vec<u32> = std::iter::from_fn(|| pipe.try_read()).collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 100, 101, 102, 103]);
}

#[test]
fn blocking_reservation_waits_for_room() {
    let pipe = Pipe::new(4);
    for v in 0..4u8 {
        assert!(pipe.try_write(v));
    }

    thread::scope(|s| {
        s.spawn(|| {
            // Cannot proceed until the consumer below makes room.
            let r = pipe.reserve_write(2).expect("non-empty request");
            r.fill_from(&[10, 11]);
        });

        thread::sleep(Duration::from_millis(30));
        assert_eq!(pipe.try_read(), Some(0));
        assert_eq!(pipe.try_read(), Some(1));
    });

    let rest: Vec<u8> = std::iter::from_fn(|| pipe.try_read()).collect();
    assert_eq!(rest, vec![2, 3, 10, 11]);
}

#[test]
fn blocking_read_reservation_waits_for_data() {
    let pipe = Pipe::new(8);

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            let mut r = pipe.reserve_read(3).expect("non-empty request");
            let values = r.to_vec();
            r.commit();
            values
        });

        thread::sleep(Duration::from_millis(20));
        for v in [5u32, 6, 7] {
            pipe.write(v);
        }

        assert_eq!(consumer.join().unwrap(), vec![5, 6, 7]);
    });

    assert!(pipe.is_empty());
}

#[test]
fn interleaved_reservations_and_plain_traffic() {
    let pipe = Pipe::new(8);

    let r = pipe.try_reserve_write(3).expect("room for 3");
    assert!(pipe.try_write(30));
    assert!(pipe.try_write(31));
    r.fill_from(&[20, 21, 22]);
    drop(r);

    let taken = pipe.try_reserve_read(4).expect("4 visible");
    assert_eq!(taken.to_vec(), vec![20, 21, 22, 30]);
    drop(taken);

    assert_eq!(pipe.try_read(), Some(31));
    assert!(pipe.is_empty());
}
