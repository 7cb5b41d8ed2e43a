use std::sync::{Arc, Mutex};
use std::thread;

use statly_observe::{Breadcrumb, Client, ClientOptions, Event, Hub, Level, Transport};

#[derive(Default)]
struct CollectingTransport(Mutex<Vec<Event<'static>>>);

impl Transport for CollectingTransport {
    fn send(&self, event: Event<'static>) -> bool {
        self.0.lock().unwrap().push(event);
        true
    }
}

fn collecting_client(max_breadcrumbs: usize) -> (Arc<Client>, Arc<CollectingTransport>) {
    let transport = Arc::new(CollectingTransport::default());
    let client = Arc::new(Client::from(ClientOptions {
        max_breadcrumbs,
        transport: Some(transport.clone()),
        ..Default::default()
    }));
    (client, transport)
}

#[test]
fn test_concurrent_captures_see_consistent_snapshots() {
    let (client, transport) = collecting_client(1000);

    // every mutation writes a breadcrumb and a tag carrying the same counter
    // in one scope update, so a consistent snapshot always has
    // `tags["counter"] == breadcrumbs.len()`.
    let writers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    client.configure_scope(|scope| {
                        scope.add_breadcrumb(Breadcrumb::default());
                        let count = scope.breadcrumbs().count();
                        scope.set_tag("counter", count);
                    });
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            thread::spawn(move || {
                for j in 0..50 {
                    client.capture_message(&format!("reader {} message {}", i, j), Level::Info);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    let events = transport.0.lock().unwrap();
    assert_eq!(events.len(), 200);
    for event in events.iter() {
        let expected: usize = event.tags.get("counter").map_or(0, |c| c.parse().unwrap());
        assert_eq!(event.breadcrumbs.len(), expected);
    }
    assert_eq!(client.scope().breadcrumbs().count(), 200);
}

#[test]
fn test_hub_per_thread() {
    let (client, transport) = collecting_client(100);
    client.set_tag("service", "worker");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            thread::spawn(move || {
                let hub = Hub::new(client);
                hub.configure_scope(|scope| scope.set_tag("thread", i));
                hub.add_breadcrumb(Breadcrumb {
                    message: Some(format!("started {}", i)),
                    ..Default::default()
                });
                hub.capture_message("done", Level::Info)
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.iter().all(|id| !id.is_nil()));

    let events = transport.0.lock().unwrap();
    assert_eq!(events.len(), 8);
    for event in events.iter() {
        let thread = &event.tags["thread"];
        assert_eq!(event.tags["service"], "worker");
        assert_eq!(event.breadcrumbs.len(), 1);
        assert_eq!(
            event.breadcrumbs[0].message.as_deref(),
            Some(format!("started {}", thread).as_str())
        );
    }
    assert_eq!(client.scope().breadcrumbs().count(), 0);
}
