//! Example demonstrating prioritized callbacks, one-shot connections and async waits.

use std::cell::Cell;
use std::rc::Rc;

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use signals::{Error, Signal};

fn main() {
    println!("=== Priorities ===");
    priorities_example();

    println!("\n=== One-shot connections ===");
    once_example();

    println!("\n=== Disconnect and reconnect ===");
    reconnect_example();

    println!("\n=== Waiting for the next fire ===");
    wait_example();
}

/// Demonstrates that higher priorities run first and equal priorities run in connection order.
fn priorities_example() {
    let saved = Signal::<String>::builder().name("document_saved").build();

    saved
        .connect(|path| println!("refresh file list after saving {path}"))
        .unwrap();

    saved
        .connect_with_priority(100, |path| println!("flush caches for {path}"))
        .unwrap();

    saved
        .connect(|path| println!("notify collaborators about {path}"))
        .unwrap();

    saved.fire("notes.txt".to_string());
}

/// Demonstrates a callback that runs only once, even when the signal fires from inside it.
fn once_example() {
    let ready = Signal::<()>::new();
    let forwarder = ready.forwarder();

    ready
        .once(move |()| {
            println!("initializing (fires again from inside the callback)");
            forwarder.fire(());
        })
        .unwrap();

    ready.connect(|()| println!("ready")).unwrap();

    ready.fire(());
    ready.fire(());

    println!("connections left: {}", ready.connection_count());
}

/// Demonstrates temporarily silencing a callback.
fn reconnect_example() {
    let tick = Signal::<u32>::new();
    let seen = Rc::new(Cell::new(0));

    let connection = tick
        .connect({
            let seen = Rc::clone(&seen);
            move |n| {
                seen.set(seen.get() + 1);
                println!("tick {n}");
            }
        })
        .unwrap();

    tick.fire(1);

    connection.disconnect();
    tick.fire(2);

    connection.reconnect().unwrap();
    tick.fire(3);

    println!("callback saw {} of 3 ticks", seen.get());
}

/// Demonstrates an async task suspended until the signal fires, and what happens on destroy.
fn wait_example() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();

    let temperature = Signal::<f32>::new();

    spawner
        .spawn_local({
            let temperature = temperature.clone();
            async move {
                loop {
                    match temperature.wait() {
                        Ok(wait) => match wait.await {
                            Ok(celsius) => println!("task woke up: {celsius} °C"),
                            Err(Error::DestroyedSignal) => {
                                println!("task woke up: sensor shut down");
                                break;
                            }
                            Err(error) => panic!("unexpected error: {error}"),
                        },
                        Err(error) => {
                            println!("cannot wait: {error}");
                            break;
                        }
                    }
                }
            }
        })
        .unwrap();

    pool.run_until_stalled();
    temperature.fire(21.5);

    pool.run_until_stalled();
    temperature.fire(22.0);

    pool.run_until_stalled();
    temperature.destroy();

    pool.run();
}
