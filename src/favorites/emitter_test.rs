use super::*;

fn event(version: u64, cause: ChangeCause) -> FavoritesChanged {
    FavoritesChanged { version, favorites: FavoriteSet::new(), cause }
}

fn recorder() -> (Listener, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: Listener = Arc::new(move |e: &FavoritesChanged| sink.lock().unwrap().push(e.version));
    (listener, seen)
}

#[test]
fn initial_snapshot_goes_only_to_new_listener() {
    let emitter = Emitter::new();
    let (first, first_seen) = recorder();
    let (second, second_seen) = recorder();

    let _a = emitter.register(first, event(0, ChangeCause::Initial));
    emitter.flush();
    let _b = emitter.register(second, event(1, ChangeCause::Initial));
    emitter.flush();

    assert_eq!(*first_seen.lock().unwrap(), vec![0]);
    assert_eq!(*second_seen.lock().unwrap(), vec![1]);
}

#[test]
fn broadcast_reaches_all_in_order() {
    let emitter = Emitter::new();
    let (a, a_seen) = recorder();
    let (b, b_seen) = recorder();
    let _sa = emitter.register(a, event(0, ChangeCause::Initial));
    let _sb = emitter.register(b, event(0, ChangeCause::Initial));

    emitter.enqueue(event(1, ChangeCause::Cleared));
    emitter.enqueue(event(2, ChangeCause::Cleared));
    emitter.flush();

    assert_eq!(*a_seen.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(*b_seen.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn unsubscribe_is_idempotent_and_stops_delivery() {
    let emitter = Emitter::new();
    let (a, seen) = recorder();
    let sub = emitter.register(a, event(0, ChangeCause::Initial));
    emitter.flush();

    sub.unsubscribe();
    sub.unsubscribe();
    emitter.enqueue(event(1, ChangeCause::Cleared));
    emitter.flush();

    assert_eq!(*seen.lock().unwrap(), vec![0]);
    assert_eq!(emitter.listener_count(), 0);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let emitter = Emitter::new();
    let (a, _) = recorder();
    let sub = emitter.register(a, event(0, ChangeCause::Initial));
    assert_eq!(emitter.listener_count(), 1);
    drop(sub);
    assert_eq!(emitter.listener_count(), 0);
}

#[test]
fn unsubscribe_after_emitter_dropped_is_noop() {
    let emitter = Emitter::new();
    let (a, _) = recorder();
    let sub = emitter.register(a, event(0, ChangeCause::Initial));
    drop(emitter);
    sub.unsubscribe();
    drop(sub);
}

#[test]
fn reentrant_enqueue_is_delivered_after_current_event() {
    let emitter = Emitter::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let weak = Arc::downgrade(&emitter);
    let sink = Arc::clone(&order);
    let listener: Listener = Arc::new(move |e: &FavoritesChanged| {
        sink.lock().unwrap().push(e.version);
        if e.version == 1 {
            let emitter = weak.upgrade().unwrap();
            emitter.enqueue(event(2, ChangeCause::Cleared));
            // Nested flush must not deliver version 2 inside version 1.
            emitter.flush();
            sink.lock().unwrap().push(100);
        }
    });
    let _sub = emitter.register(listener, event(0, ChangeCause::Initial));
    emitter.enqueue(event(1, ChangeCause::Cleared));
    emitter.flush();

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 100, 2]);
}

#[test]
fn panicking_listener_does_not_wedge_delivery() {
    let emitter = Emitter::new();
    let panicky: Listener = Arc::new(|e: &FavoritesChanged| {
        if e.version == 1 {
            panic!("listener failure");
        }
    });
    let sub = emitter.register(panicky, event(0, ChangeCause::Initial));
    emitter.flush();

    emitter.enqueue(event(1, ChangeCause::Cleared));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| emitter.flush()));
    assert!(result.is_err());
    drop(sub);

    let (a, seen) = recorder();
    let _sa = emitter.register(a, event(5, ChangeCause::Initial));
    emitter.flush();
    assert_eq!(*seen.lock().unwrap(), vec![5]);
}

#[test]
fn event_flushed_from_another_thread_mid_drain_is_delivered() {
    let emitter = Emitter::new();
    let (a, seen) = recorder();
    let other = Arc::clone(&emitter);
    let handoff: Listener = Arc::new(move |e: &FavoritesChanged| {
        if e.version == 1 {
            let other = Arc::clone(&other);
            // Sees `draining == true` and returns; the current drainer owns it.
            std::thread::spawn(move || {
                other.enqueue(event(2, ChangeCause::Cleared));
                other.flush();
            })
            .join()
            .unwrap();
        }
    });
    let _sa = emitter.register(a, event(0, ChangeCause::Initial));
    let _sh = emitter.register(handoff, event(0, ChangeCause::Initial));

    emitter.enqueue(event(1, ChangeCause::Cleared));
    emitter.flush();

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert!(!emitter.lock().draining);
}

#[test]
fn concurrent_flushes_leave_nothing_queued() {
    const THREADS: u64 = 4;
    const PER_THREAD: u64 = 200;

    let emitter = Emitter::new();
    let delivered = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter = Arc::clone(&delivered);
    let listener: Listener = Arc::new(move |_: &FavoritesChanged| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    let _sub = emitter.register(listener, event(0, ChangeCause::Initial));
    emitter.flush();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let emitter = Arc::clone(&emitter);
            std::thread::spawn(move || {
                for i in 0..PER_THREAD {
                    emitter.enqueue(event(t * PER_THREAD + i + 1, ChangeCause::Cleared));
                    emitter.flush();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let inner = emitter.lock();
    assert!(inner.queue.is_empty());
    assert!(!inner.draining);
    drop(inner);
    assert_eq!(delivered.load(std::sync::atomic::Ordering::SeqCst), 1 + THREADS * PER_THREAD);
}
